//! Error types for sampling and command execution.

use thiserror::Error;

use crate::collector::procfs::ParseError;

/// Failure of an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Reason a collection pass produced nothing.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A required external tool is not installed; the cycle is skipped.
    #[error("required tool `{0}` not found")]
    MissingPrerequisite(&'static str),
    /// The primary listing command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// The primary input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The primary input was unusable.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ParseError> for CollectError {
    fn from(err: ParseError) -> Self {
        CollectError::Parse(err.message)
    }
}

impl CollectError {
    /// Missing prerequisites are expected on hosts without the subsystem and
    /// are logged below error level.
    pub fn is_prerequisite(&self) -> bool {
        matches!(self, CollectError::MissingPrerequisite(_))
    }
}
