//! Error types for running pt-online-schema-change.

use thiserror::Error;

/// Main error type for ptosc operations.
///
/// Tool availability is deliberately absent: a missing tool is reported by
/// [`crate::probe::AvailabilityProbe`] as `false`, never as an error.
#[derive(Error, Debug)]
pub enum OscError {
    /// The tool ran and exited with a non-zero status
    #[error("{command} exited with {exit_code}")]
    ToolExecutionFailed { command: String, exit_code: i32 },

    /// The tool could not be started, waited on, or the wait was interrupted
    #[error("unexpected failure running {command}: {source}")]
    UnexpectedInvocationFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration failed validation
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl OscError {
    /// Exit code of the tool, if this error came from a finished run.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            OscError::ToolExecutionFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// True when the run was cancelled while waiting for the tool to exit.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            OscError::UnexpectedInvocationFailure { source, .. }
                if source.kind() == std::io::ErrorKind::Interrupted
        )
    }
}

/// Result type alias for ptosc operations
pub type Result<T> = std::result::Result<T, OscError>;
