//! Command-line construction for pt-online-schema-change.
//!
//! [`builder`] turns an [`InvocationSpec`] into the argv handed to the process
//! API (one element per argument, never a shell string). [`formatter`] renders
//! that argv for logs with the password masked.

pub mod builder;
pub mod formatter;

use std::fmt;

pub use builder::{CommandBuilder, ConnectionInfo, InvocationSpec, DEFAULT_COMMAND};
pub use formatter::format_command;

/// Ordered argument list for one tool invocation.
///
/// The first element is always the tool's invocation name. Both `Display` and
/// `Debug` render the masked form, so a `Command` can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    pub(crate) fn new(args: Vec<String>) -> Self {
        Command { args }
    }

    /// The executable name (argv[0]).
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Everything after argv[0].
    pub fn args(&self) -> &[String] {
        &self.args[1..]
    }

    /// The full argv including the program.
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Masked, quoted single-line form for logging.
    pub fn display(&self) -> String {
        format_command(self.args.as_slice())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.display()).finish()
    }
}
