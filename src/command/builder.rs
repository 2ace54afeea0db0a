//! Builds the pt-online-schema-change argv from an invocation request.

use std::fmt;

use super::Command;

/// Invocation name of the tool.
pub const DEFAULT_COMMAND: &str = "pt-online-schema-change";

const FOREIGN_KEYS_METHOD: &str = "--alter-foreign-keys-method=auto";

/// Connection details taken from the database connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One schema-change request: which table to alter and how.
///
/// `alter` is the `ALTER TABLE` body without the table name. It is passed
/// through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    pub table: String,
    pub alter: String,
    pub schema: String,
    pub connection: Option<ConnectionInfo>,
}

impl InvocationSpec {
    pub fn new(
        table: impl Into<String>,
        alter: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        InvocationSpec {
            table: table.into(),
            alter: alter.into(),
            schema: schema.into(),
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionInfo) -> Self {
        self.connection = Some(connection);
        self
    }
}

impl fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ptosc[table: {}, alter: {}]", self.table, self.alter)
    }
}

/// Builds [`Command`]s for a configured tool name and extra options.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    additional_options: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        CommandBuilder::new(DEFAULT_COMMAND)
    }
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        CommandBuilder {
            program: program.into(),
            additional_options: String::new(),
        }
    }

    /// Extra options inserted right after the program name.
    ///
    /// The string becomes a single argument; splitting it is up to whoever
    /// assembled it.
    pub fn with_additional_options(mut self, options: impl Into<String>) -> Self {
        self.additional_options = options.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn additional_options(&self) -> &str {
        &self.additional_options
    }

    /// Build the argv for `spec`.
    ///
    /// Order: program, extra options, `--alter=`, foreign-keys method, the
    /// connection flags (password only when present), `--execute`, and the
    /// `D=<schema>,t=<table>` DSN.
    pub fn build(&self, spec: &InvocationSpec) -> Command {
        let mut args = Vec::with_capacity(10);
        args.push(self.program.clone());

        if !self.additional_options.is_empty() {
            args.push(self.additional_options.clone());
        }

        args.push(format!("--alter={}", spec.alter));
        args.push(FOREIGN_KEYS_METHOD.to_string());

        if let Some(conn) = &spec.connection {
            args.push(format!("--host={}", conn.host));
            args.push(format!("--port={}", conn.port));
            args.push(format!("--user={}", conn.user));
            if let Some(pw) = &conn.password {
                args.push(format!("--password={}", pw));
            }
        }

        args.push("--execute".to_string());
        args.push(format!("D={},t={}", spec.schema, spec.table));

        Command::new(args)
    }
}
