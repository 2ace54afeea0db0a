//! ptosc: runs `pt-online-schema-change` for schema migrations.
//! Builds the tool's command line from a schema-change request, runs it
//! without a shell, streams its output into a log sink line by line with the
//! password masked, and caches whether the tool is installed.

pub mod command;
pub mod config;
pub mod error;
pub mod probe;
pub mod runner;
pub mod sink;

pub use command::{
    format_command, Command, CommandBuilder, ConnectionInfo, InvocationSpec, DEFAULT_COMMAND,
};
pub use config::{parse_env_ref, ConnectionConfig, OscConfig, ToolConfig};
pub use error::{OscError, Result};
pub use probe::{Availability, AvailabilityProbe, CommandProber, Prober};
pub use runner::{LineTeeWriter, ProcessRunner};
pub use sink::{LogSink, TracingSink};
