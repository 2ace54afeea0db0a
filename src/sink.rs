//! Log sink contract for tool output.
//!
//! The runner never writes partial lines: every `info` call carries one
//! complete line of tool output.

use std::error::Error;

/// Line-oriented logger that receives the tool's output.
pub trait LogSink: Send + Sync {
    /// One complete line of tool output.
    fn info(&self, line: &str);

    /// A diagnostic message with the error that caused it.
    fn debug(&self, message: &str, error: &dyn Error);
}

/// Default sink: forwards tool output into `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, line: &str) {
        tracing::info!(target: "ptosc::tool", "{}", line);
    }

    fn debug(&self, message: &str, error: &dyn Error) {
        tracing::debug!(target: "ptosc::tool", error = %error, "{}", message);
    }
}
