use crate::{Error, FsmResult};
use std::{
    fmt,
    io::{self, BufWriter},
    path::PathBuf,
    str::FromStr,
};

/// Possible choices for output streams. Used by the `-o` option to the
/// compiler.
/// * "-" and "<out>" are treated as stdout.
/// * "<err>" is treated as stderr.
/// * "<null>" is treated as a null output stream.
/// * All other strings are treated as file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFile {
    Null,
    Stdout,
    Stderr,
    File {
        path: PathBuf,
        // Has the writer been initialized?
        init: bool,
    },
}

impl OutputFile {
    pub fn file(path: PathBuf) -> Self {
        OutputFile::File { path, init: false }
    }

    pub fn as_path_string(&self) -> String {
        match self {
            OutputFile::Null => "<null>".to_string(),
            OutputFile::Stdout => "<stdout>".to_string(),
            OutputFile::Stderr => "<stderr>".to_string(),
            OutputFile::File { path, .. } => path.to_string_lossy().to_string(),
        }
    }

    /// Open a writer for this stream. The first call on a file truncates it
    /// and later calls append to it.
    pub fn get_write(&mut self) -> FsmResult<Box<dyn io::Write>> {
        Ok(match self {
            OutputFile::Stdout => Box::new(BufWriter::new(io::stdout())),
            OutputFile::Stderr => Box::new(BufWriter::new(io::stderr())),
            OutputFile::File { path, init } => {
                let file = if *init {
                    std::fs::OpenOptions::new().append(true).open(&*path)
                } else {
                    std::fs::File::create(&*path)
                }
                .map_err(|err| {
                    Error::write_error(format!(
                        "Failed to open `{}`: {err}",
                        path.to_string_lossy()
                    ))
                })?;
                *init = true;
                Box::new(BufWriter::new(file))
            }
            OutputFile::Null => Box::new(io::sink()),
        })
    }
}

impl FromStr for OutputFile {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "-" | "<out>" => Ok(OutputFile::Stdout),
            "<err>" => Ok(OutputFile::Stderr),
            "<null>" => Ok(OutputFile::Null),
            _ => Ok(OutputFile::file(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFile::Stdout => write!(f, "-"),
            OutputFile::Stderr => write!(f, "<err>"),
            OutputFile::Null => write!(f, "<null>"),
            OutputFile::File { path, .. } => {
                write!(f, "{}", path.to_string_lossy())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_streams() {
        assert_eq!("-".parse::<OutputFile>(), Ok(OutputFile::Stdout));
        assert_eq!("<err>".parse::<OutputFile>(), Ok(OutputFile::Stderr));
        assert_eq!(
            "out.v".parse::<OutputFile>(),
            Ok(OutputFile::file("out.v".into()))
        );
    }
}
