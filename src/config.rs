//! ptosc configuration: deserialization and validation.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::command::{CommandBuilder, ConnectionInfo, DEFAULT_COMMAND};
use crate::error::OscError;
use crate::probe::{CommandProber, DEFAULT_PROBE_TIMEOUT};
use crate::runner::{ProcessRunner, DEFAULT_DRAIN_JOIN_TIMEOUT};

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` if the value is not a
/// valid env-var reference.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Top-level ptosc configuration, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OscConfig {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,
}

/// How to invoke pt-online-schema-change.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Executable name or path.
    #[serde(default = "default_command")]
    pub command: String,
    /// Pre-formed options string, passed to the tool as one argument.
    #[serde(default)]
    pub additional_options: String,
    /// Upper bound for the `--version` availability check.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// How long to wait for each output drain after the tool exits.
    #[serde(default = "default_drain_join_timeout_ms")]
    pub drain_join_timeout_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            command: default_command(),
            additional_options: String::new(),
            probe_timeout_secs: default_probe_timeout_secs(),
            drain_join_timeout_ms: default_drain_join_timeout_ms(),
        }
    }
}

/// Target database connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// Must be a `${VAR}` reference; literal passwords are rejected.
    pub password: Option<String>,
    /// Default schema for `D=<schema>` when none is given per invocation.
    pub schema: Option<String>,
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_secs()
}

fn default_drain_join_timeout_ms() -> u64 {
    DEFAULT_DRAIN_JOIN_TIMEOUT.as_millis() as u64
}

fn default_port() -> u16 {
    3306
}

impl ConnectionConfig {
    /// Resolve into connection info, reading the password from its env var.
    ///
    /// An unset variable means no password, so no `--password` flag is built.
    pub fn resolve(&self) -> ConnectionInfo {
        let password = self
            .password
            .as_deref()
            .and_then(parse_env_ref)
            .and_then(|var| std::env::var(var).ok());
        ConnectionInfo {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password,
        }
    }
}

impl OscConfig {
    /// Validate the config, failing fast before anything is spawned.
    pub fn validate(&self) -> crate::Result<()> {
        let tool = &self.tool;
        if tool.command.trim().is_empty() {
            return Err(OscError::InvalidConfig(
                "tool.command must not be empty".to_string(),
            ));
        }
        if tool.probe_timeout_secs == 0 {
            return Err(OscError::InvalidConfig(
                "tool.probe_timeout_secs must be > 0".to_string(),
            ));
        }
        if tool.drain_join_timeout_ms == 0 {
            return Err(OscError::InvalidConfig(
                "tool.drain_join_timeout_ms must be > 0".to_string(),
            ));
        }

        if let Some(conn) = &self.connection {
            if conn.host.is_empty() {
                return Err(OscError::InvalidConfig(
                    "connection.host must not be empty".to_string(),
                ));
            }
            if conn.user.is_empty() {
                return Err(OscError::InvalidConfig(
                    "connection.user must not be empty".to_string(),
                ));
            }
            // Never echo the rejected value: it may be a real password.
            if let Some(pw) = &conn.password {
                if parse_env_ref(pw).is_none() {
                    return Err(OscError::InvalidConfig(
                        "connection.password must be a ${VAR} reference".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn command_builder(&self) -> CommandBuilder {
        CommandBuilder::new(self.tool.command.clone())
            .with_additional_options(self.tool.additional_options.clone())
    }

    /// Runner that logs through `tracing`.
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.command_builder())
            .with_drain_join_timeout(Duration::from_millis(self.tool.drain_join_timeout_ms))
    }

    pub fn prober(&self) -> CommandProber {
        CommandProber::new(self.tool.command.clone())
            .with_timeout(Duration::from_secs(self.tool.probe_timeout_secs))
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.connection.as_ref().map(ConnectionConfig::resolve)
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.connection.as_ref().and_then(|c| c.schema.as_deref())
    }
}

impl FromStr for OscConfig {
    type Err = OscError;

    /// Parse TOML and validate.
    fn from_str(s: &str) -> crate::Result<Self> {
        let config: OscConfig =
            toml::from_str(s).map_err(|e| OscError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_toml(toml_str: &str) -> OscConfig {
        toml::from_str(toml_str).expect("valid TOML")
    }

    #[test]
    fn test_parse_env_ref() {
        assert_eq!(parse_env_ref("${FOO}"), Some("FOO"));
        assert_eq!(parse_env_ref("${MYSQL_PWD}"), Some("MYSQL_PWD"));
        assert_eq!(parse_env_ref("$FOO"), None);
        assert_eq!(parse_env_ref("literal"), None);
        assert_eq!(parse_env_ref("${"), None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_toml("");
        assert!(config.validate().is_ok());
        assert_eq!(config.tool.command, "pt-online-schema-change");
        assert_eq!(config.tool.additional_options, "");
        assert_eq!(config.tool.probe_timeout_secs, 30);
        assert_eq!(config.tool.drain_join_timeout_ms, 5000);
        assert!(config.connection.is_none());
        assert!(config.connection_info().is_none());
    }

    #[test]
    fn test_full_config() {
        let config: OscConfig = r#"
            [tool]
            command = "/usr/local/bin/pt-online-schema-change"
            additional_options = "--chunk-size=500"
            drain_join_timeout_ms = 1000

            [connection]
            host = "db1"
            user = "root"
            password = "${PTOSC_TEST_UNSET_PASSWORD}"
            schema = "testdb"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.tool.probe_timeout_secs, 30);
        let conn = config.connection.as_ref().unwrap();
        assert_eq!(conn.port, 3306);
        assert_eq!(config.default_schema(), Some("testdb"));

        let builder = config.command_builder();
        assert_eq!(builder.program(), "/usr/local/bin/pt-online-schema-change");
        assert_eq!(builder.additional_options(), "--chunk-size=500");
        assert_eq!(config.prober().program(), "/usr/local/bin/pt-online-schema-change");
    }

    #[test]
    fn test_password_resolved_from_env() {
        // SAFETY: test-only, no concurrent threads depend on this env var.
        unsafe { std::env::set_var("PTOSC_TEST_PASSWORD", "secret") };
        let config = parse_toml(
            r#"
            [connection]
            host = "db1"
            port = 3307
            user = "root"
            password = "${PTOSC_TEST_PASSWORD}"
            "#,
        );
        let info = config.connection_info().unwrap();
        assert_eq!(info.host, "db1");
        assert_eq!(info.port, 3307);
        assert_eq!(info.password.as_deref(), Some("secret"));
        unsafe { std::env::remove_var("PTOSC_TEST_PASSWORD") };
    }

    #[test]
    fn test_unset_password_var_means_no_password() {
        let config = parse_toml(
            r#"
            [connection]
            host = "db1"
            user = "root"
            password = "${PTOSC_TEST_DEFINITELY_UNSET}"
            "#,
        );
        assert_eq!(config.connection_info().unwrap().password, None);
    }

    #[test]
    fn test_literal_password_rejected_without_echo() {
        let err = "[connection]\nhost = \"db1\"\nuser = \"root\"\npassword = \"hunter2\"\n"
            .parse::<OscConfig>()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("${VAR} reference"), "{msg}");
        assert!(!msg.contains("hunter2"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = parse_toml("[tool]\ncommand = \"\"\n");
        assert!(matches!(
            config.validate(),
            Err(OscError::InvalidConfig(ref msg)) if msg.contains("tool.command")
        ));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = parse_toml("[tool]\nprobe_timeout_secs = 0\n");
        assert!(config.validate().is_err());
        let config = parse_toml("[tool]\ndrain_join_timeout_ms = 0\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = parse_toml("[connection]\nhost = \"\"\nuser = \"root\"\n");
        assert!(matches!(
            config.validate(),
            Err(OscError::InvalidConfig(ref msg)) if msg.contains("connection.host")
        ));
    }

    #[test]
    fn test_empty_user_rejected() {
        let config = parse_toml("[connection]\nhost = \"db1\"\nuser = \"\"\n");
        assert!(matches!(
            config.validate(),
            Err(OscError::InvalidConfig(ref msg)) if msg.contains("connection.user")
        ));
    }

    #[test]
    fn test_malformed_toml_is_invalid_config() {
        let err = "[tool\ncommand = 1".parse::<OscConfig>().unwrap_err();
        assert!(matches!(err, OscError::InvalidConfig(_)));
    }
}
