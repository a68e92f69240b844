//! Interface for a genfsm backend.
use genfsm_ir::{Config, Context, Graph};
use genfsm_utils::{Error, FsmResult, OutputFile};
use std::io::Write;

/// An optimized generator together with the options it was compiled with.
pub struct Design {
    pub ctx: Context,
    pub graph: Graph,
    pub config: Config,
}

/// A backend for genfsm.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;
    /// Validate this design for emitting using this backend. Returns an
    /// Err(..) if the design has unexpected constructs.
    fn validate(design: &Design) -> FsmResult<()>;
    /// Transforms the design into the text produced by this backend.
    fn render(design: &Design) -> FsmResult<String>;
    /// Write the rendered design to `file`.
    fn emit(design: &Design, file: &mut OutputFile) -> FsmResult<()> {
        let text = Self::render(design)?;
        write_text(&text, file)
    }
    /// Convience function to validate and emit the design.
    fn run(&self, design: &Design, mut file: OutputFile) -> FsmResult<()> {
        Self::validate(design)?;
        Self::emit(design, &mut file)
    }
}

/// Write already rendered text to `file`.
pub fn write_text(text: &str, file: &mut OutputFile) -> FsmResult<()> {
    let mut out = file.get_write()?;
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::write_error(format!(
                "{}: {err}",
                file.as_path_string()
            ))
        })
}
