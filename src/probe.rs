//! Tool availability probe.
//!
//! Runs `<tool> --version` at most once per [`AvailabilityProbe`] and caches
//! the answer for the rest of the process lifetime. A missing tool is an
//! answer (`available = false`), not an error. Concurrent first callers wait
//! on the single in-flight probe instead of each spawning their own.

use std::future::Future;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::command::DEFAULT_COMMAND;

/// Default upper bound for a single `--version` run.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of probing the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    /// `--version` output with all line breaks removed.
    pub version: Option<String>,
}

impl Availability {
    pub fn unavailable() -> Self {
        Availability {
            available: false,
            version: None,
        }
    }

    pub fn available(version: impl Into<String>) -> Self {
        Availability {
            available: true,
            version: Some(version.into()),
        }
    }
}

/// Something that can find out whether the tool is installed.
pub trait Prober: Send + Sync {
    fn probe(&self) -> impl Future<Output = Availability> + Send;
}

/// Probes by running `<program> --version`.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: String,
    timeout: Duration,
}

impl Default for CommandProber {
    fn default() -> Self {
        CommandProber::new(DEFAULT_COMMAND)
    }
}

impl CommandProber {
    pub fn new(program: impl Into<String>) -> Self {
        CommandProber {
            program: program.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Prober for CommandProber {
    async fn probe(&self) -> Availability {
        let child = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program = %self.program, error = %e, "tool not available");
                return Availability::unavailable();
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::debug!(program = %self.program, error = %e, "version check failed");
                return Availability::unavailable();
            }
            Err(_) => {
                tracing::debug!(
                    program = %self.program,
                    timeout_secs = %self.timeout.as_secs(),
                    "version check timed out"
                );
                return Availability::unavailable();
            }
        };

        // stderr is folded in after stdout, as if it had been redirected.
        let mut merged = output.stdout;
        merged.extend_from_slice(&output.stderr);
        let version: String = String::from_utf8_lossy(&merged)
            .chars()
            .filter(|c| *c != '\n' && *c != '\r')
            .collect();

        tracing::info!("Using percona toolkit: {}", version);
        Availability::available(version)
    }
}

/// Lazily probed, write-once availability record.
pub struct AvailabilityProbe<P> {
    prober: P,
    state: OnceCell<Availability>,
}

impl<P: Prober> AvailabilityProbe<P> {
    pub fn new(prober: P) -> Self {
        AvailabilityProbe {
            prober,
            state: OnceCell::new(),
        }
    }

    /// Probe on first call; every later call returns the cached record.
    pub async fn availability(&self) -> &Availability {
        self.state.get_or_init(|| self.prober.probe()).await
    }

    pub async fn is_available(&self) -> bool {
        self.availability().await.available
    }

    pub async fn version(&self) -> Option<&str> {
        self.availability().await.version.as_deref()
    }

    /// The cached record, without probing.
    pub fn cached(&self) -> Option<&Availability> {
        self.state.get()
    }
}

/// Process-wide probe for the default tool name.
///
/// For library callers that share one cached answer across the process; the
/// `ptosc` binary builds its own probe from the configured command instead.
pub fn global() -> &'static AvailabilityProbe<CommandProber> {
    static GLOBAL: OnceLock<AvailabilityProbe<CommandProber>> = OnceLock::new();
    GLOBAL.get_or_init(|| AvailabilityProbe::new(CommandProber::default()))
}
