//! Process runner: spawns pt-online-schema-change, streams its output into a
//! [`LogSink`] line by line, and maps the exit status to a result.
//!
//! One invocation moves through `NotStarted -> Started -> Draining ->
//! WaitingExit -> Validating -> Cleanup`. Cleanup runs on every path: the
//! child's stdin is closed, the drain tasks are aborted (dropping the stdout
//! and stderr handles), and the child is killed if it is still running.

pub mod drain;
pub mod tee;

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::{CommandBuilder, InvocationSpec};
use crate::error::OscError;
use crate::sink::{LogSink, TracingSink};

pub use drain::spawn_drain;
pub use tee::{LineTeeWriter, SharedTee};

/// How long to wait for each drain after the child exits.
pub const DEFAULT_DRAIN_JOIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Lifecycle phase of one invocation, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Started,
    Draining,
    WaitingExit,
    Validating,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Started => "started",
            Phase::Draining => "draining",
            Phase::WaitingExit => "waiting-exit",
            Phase::Validating => "validating",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

fn enter(phase: Phase) {
    tracing::trace!(%phase, "invocation phase");
}

/// Runs one schema change per call to [`ProcessRunner::run`].
pub struct ProcessRunner<S = TracingSink> {
    builder: CommandBuilder,
    sink: Arc<S>,
    drain_join_timeout: Duration,
}

impl ProcessRunner<TracingSink> {
    /// Runner that logs tool output through `tracing`.
    pub fn new(builder: CommandBuilder) -> Self {
        ProcessRunner::with_sink(builder, Arc::new(TracingSink))
    }
}

impl<S: LogSink + 'static> ProcessRunner<S> {
    pub fn with_sink(builder: CommandBuilder, sink: Arc<S>) -> Self {
        ProcessRunner {
            builder,
            sink,
            drain_join_timeout: DEFAULT_DRAIN_JOIN_TIMEOUT,
        }
    }

    pub fn with_drain_join_timeout(mut self, timeout: Duration) -> Self {
        self.drain_join_timeout = timeout;
        self
    }

    /// Run the tool for `spec` and wait for it to finish.
    ///
    /// Every line the tool prints on stdout or stderr reaches the sink's
    /// `info`, including a final line without a trailing newline.
    ///
    /// # Errors
    /// - `ToolExecutionFailed` when the tool exits non-zero (killed by a
    ///   signal counts as `-1`).
    /// - `UnexpectedInvocationFailure` when the tool cannot be spawned, the
    ///   wait fails, or `cancel` fires before the tool exits. Cancellation
    ///   carries `io::ErrorKind::Interrupted`.
    pub async fn run(&self, spec: &InvocationSpec, cancel: &CancellationToken) -> crate::Result<()> {
        let start = Instant::now();
        let command = self.builder.build(spec);
        let program = command.program().to_string();

        tracing::info!("Executing: {}", command);

        let child = tokio::process::Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unexpected(&program, e))?;
        enter(Phase::Started);

        let mut guard = ChildGuard::new(child);
        let tee = LineTeeWriter::shared(self.sink.clone());
        if let Some(stdout) = guard.child.stdout.take() {
            guard.drains.push(spawn_drain("stdout", stdout, tee.clone()));
        }
        if let Some(stderr) = guard.child.stderr.take() {
            guard.drains.push(spawn_drain("stderr", stderr, tee.clone()));
        }
        enter(Phase::Draining);

        enter(Phase::WaitingExit);
        let status = tokio::select! {
            status = guard.child.wait() => status.map_err(|e| unexpected(&program, e))?,
            _ = cancel.cancelled() => {
                tracing::warn!(command = %program, "interrupted while waiting for the tool to exit");
                return Err(unexpected(
                    &program,
                    io::Error::new(io::ErrorKind::Interrupted, "interrupted while waiting for exit"),
                ));
            }
        };

        for handle in guard.drains.iter_mut() {
            match tokio::time::timeout(self.drain_join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "drain task ended abnormally"),
                Err(_) => tracing::debug!(
                    timeout_ms = %self.drain_join_timeout.as_millis(),
                    "drain still running after tool exit; trailing output may be lost"
                ),
            }
        }
        tee::lock(&tee).finish();
        enter(Phase::Validating);

        enter(Phase::Cleanup);
        guard.cleanup();

        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(
            command = %program,
            table = %spec.table,
            exit_code = %exit_code,
            duration_ms = %start.elapsed().as_millis(),
            "tool invocation finished"
        );

        check_status(&program, status)
    }
}

fn unexpected(program: &str, source: io::Error) -> OscError {
    OscError::UnexpectedInvocationFailure {
        command: program.to_string(),
        source,
    }
}

fn check_status(program: &str, status: ExitStatus) -> crate::Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(OscError::ToolExecutionFailed {
        command: program.to_string(),
        exit_code: status.code().unwrap_or(-1),
    })
}

/// Owns the child and its drains; releases them on every exit path.
struct ChildGuard {
    child: Child,
    stdin: Option<ChildStdin>,
    drains: Vec<JoinHandle<()>>,
    cleaned: bool,
}

impl ChildGuard {
    fn new(mut child: Child) -> Self {
        let stdin = child.stdin.take();
        ChildGuard {
            child,
            stdin,
            drains: Vec::with_capacity(2),
            cleaned: false,
        }
    }

    /// Close all handles and kill the child if it is still alive. Idempotent.
    fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        drop(self.stdin.take());
        drop(self.child.stdout.take());
        drop(self.child.stderr.take());
        for drain in &self.drains {
            drain.abort();
        }

        if !matches!(self.child.try_wait(), Ok(Some(_))) {
            if let Err(e) = self.child.start_kill() {
                tracing::debug!(error = %e, "failed to kill tool process");
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
