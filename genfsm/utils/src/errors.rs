//! Errors generated by the compiler.

/// Convience wrapper to represent success or meaningul compiler error.
pub type FsmResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

/// Standard error type for genfsm errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// The input uses a construct outside of the supported subset.
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),
    /// A graph invariant does not hold.
    #[error("Malformed graph: {0}")]
    MalformedGraph(String),
    /// A container was built with elements of an unexpected shape.
    #[error("Structural type error: {0}")]
    StructuralType(String),
    /// A merge was declined because it would reorder a read after a write.
    #[error("Dependency conflict on {}", .vars.join(", "))]
    DependencyConflict { vars: Vec<String> },
    /// An external tool failed.
    #[error("`{tool}` failed: {msg}")]
    ExternalTool { tool: String, msg: String },
    /// The input file is invalid (does not exist, cannot be read).
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    /// Failed to write the output
    #[error("Failed to write output: {0}")]
    WriteError(String),
    /// A miscellaneous error. Should be replaced with a more precise error.
    #[error("{0}")]
    Misc(String),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }

    /// Attach a message that is printed after the error.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn unsupported_construct<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::UnsupportedConstruct(msg.to_string()))
    }

    pub fn malformed_graph<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedGraph(msg.to_string()))
    }

    pub fn structural_type<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::StructuralType(msg.to_string()))
    }

    pub fn dependency_conflict<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::new(ErrorKind::DependencyConflict {
            vars: vars.into_iter().map(|v| v.to_string()).collect(),
        })
    }

    pub fn external_tool<S: ToString, M: ToString>(tool: S, msg: M) -> Self {
        Self::new(ErrorKind::ExternalTool {
            tool: tool.to_string(),
            msg: msg.to_string(),
        })
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Local errors are handled where they are raised and never abort a
    /// compilation.
    pub fn is_local(&self) -> bool {
        matches!(*self.kind, ErrorKind::DependencyConflict { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {err}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::write_error(format!("Formatting Error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_lists_variables() {
        let err = Error::dependency_conflict(["a", "b"]);
        assert!(err.is_local());
        assert_eq!(err.to_string(), "Dependency conflict on a, b");
    }

    #[test]
    fn post_message_follows_error() {
        let err = Error::unsupported_construct("nested function definition")
            .with_post_msg(Some("in `fib`".to_string()));
        assert!(!err.is_local());
        assert_eq!(
            err.to_string(),
            "Unsupported construct: nested function definition\nin `fib`"
        );
    }
}
