//! Errors raised while executing a template line.

use std::io;
use std::path::PathBuf;

use super::Command;

/// Failure of a single template line.
///
/// Unless the runner is in strict mode, these are logged and the run
/// continues with the next line.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("empty template line")]
    EmptyLine,

    #[error("{command}: expected {expected} argument(s), got {got}")]
    Arity {
        command: Command,
        expected: &'static str,
        got: usize,
    },

    /// A source glob matched nothing.
    #[error("couldn't find {0}")]
    Lookup(String),

    #[error("invalid glob pattern {pattern}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid regex {pattern}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid mode {0:?}: expected an octal number")]
    InvalidMode(String),

    /// Filesystem operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external program could not run or exited non-zero.
    #[error("{command}: {message}")]
    ExternalTool { command: String, message: String },
}

impl TemplateError {
    /// Adapter for `map_err` that attaches the failing path.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| TemplateError::Io { path, source }
    }
}
