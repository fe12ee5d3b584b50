//! Subprocess execution: spawn, stream, timeout, cancel.

use crate::cmd::PreparedCommand;
use crate::error::ClaudeError;
use crate::response::assemble;
use crate::stream::{parse_line, StreamEvent};
use crate::types::{InvocationResult, ProcessState};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receivers for live output of a run. Both are optional and best effort:
/// a dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct StreamSinks {
    /// Every parsed stdout event, in arrival order.
    pub events: Option<mpsc::UnboundedSender<StreamEvent>>,
    /// Assistant text blocks, in arrival order.
    pub text: Option<mpsc::UnboundedSender<String>>,
}

impl StreamSinks {
    /// Sinks that only receive events.
    #[must_use]
    pub fn events(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            events: Some(tx),
            text: None,
        }
    }

    /// Sinks that only receive assistant text.
    #[must_use]
    pub fn text(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            events: None,
            text: Some(tx),
        }
    }

    const fn is_empty(&self) -> bool {
        self.events.is_none() && self.text.is_none()
    }

    fn forward(&self, line: &str) {
        if self.is_empty() {
            return;
        }
        let Some(value) = parse_line(line) else {
            return;
        };
        let event = StreamEvent::from_value(&value);
        if let Some(tx) = &self.text {
            for text in event.assistant_text() {
                let _ = tx.send(text.to_string());
            }
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Control and observation handle for one invocation.
///
/// Clones share the same invocation, so a UI can keep one clone to cancel
/// while the run is awaited elsewhere. A handle drives a single run.
#[derive(Debug, Clone)]
pub struct InvocationHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    cancel: CancellationToken,
    state: watch::Sender<ProcessState>,
}

impl Default for InvocationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationHandle {
    /// Creates a handle in the [`ProcessState::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProcessState::Idle);
        Self {
            inner: Arc::new(HandleInner {
                cancel: CancellationToken::new(),
                state,
            }),
        }
    }

    /// Force-kills the process. No-op once the run has finished.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.inner.state.subscribe()
    }

    /// Moves to `next`. Terminal states are never left.
    fn transition(&self, next: ProcessState) -> bool {
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            tracing::debug!(state = ?next, "Process state changed");
        }
        changed
    }
}

enum Outcome {
    Finished(std::io::Result<(ExitStatus, String, String)>),
    TimedOut,
    Cancelled,
}

/// Runs `command` to completion and assembles its output.
///
/// Exactly one of these settles the call: process exit, `limit` elapsing,
/// or `handle` being cancelled. After a kill the reader tasks are aborted,
/// so no further output reaches `sinks`.
///
/// # Errors
///
/// `SpawnFailed` if the process cannot start, `Timeout` or `Cancelled` when
/// the process was killed, `NonZeroExit` for a failing exit status, `Io` if
/// waiting on the process fails.
pub async fn run_claude(
    command: &PreparedCommand,
    limit: Duration,
    sinks: StreamSinks,
    handle: &InvocationHandle,
) -> Result<InvocationResult, ClaudeError> {
    let start_time = Instant::now();
    let mut child = match spawn_child(command) {
        Ok(child) => child,
        Err(source) => {
            handle.transition(ProcessState::SpawnError);
            tracing::error!(program = %command.program.display(), error = %source, "Failed to start Claude");
            return Err(ClaudeError::SpawnFailed {
                program: command.program.clone(),
                source,
            });
        }
    };
    handle.transition(ProcessState::Spawned);
    tracing::info!(
        program = %command.program.display(),
        pid = ?child.id(),
        cwd = ?command.cwd,
        "Spawned Claude process"
    );

    // The CLI waits for input while stdin stays open.
    drop(child.stdin.take());
    handle.transition(ProcessState::Running);

    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
    let stop = handle.inner.cancel.child_token();
    let stdout_task = tokio::spawn(drain_stdout(stdout, sinks, stop.clone()));
    let stderr_task = tokio::spawn(drain_stderr(stderr));
    let readers = [stdout_task.abort_handle(), stderr_task.abort_handle()];

    let outcome = tokio::select! {
        biased;
        () = handle.inner.cancel.cancelled() => Outcome::Cancelled,
        res = wait_and_collect(&mut child, stdout_task, stderr_task) => Outcome::Finished(res),
        () = tokio::time::sleep(limit) => Outcome::TimedOut,
    };
    let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Outcome::Finished(res) => {
            let (status, stdout, stderr) = res?;
            let exit_code = status.code().unwrap_or(-1);
            handle.transition(ProcessState::Exited(exit_code));
            tracing::info!(exit_code, duration_ms, "Claude process exited");
            if status.success() {
                let mut result = assemble(&stdout);
                result.duration_ms = duration_ms;
                Ok(result)
            } else {
                Err(ClaudeError::NonZeroExit { exit_code, stderr })
            }
        }
        Outcome::TimedOut => {
            handle.transition(ProcessState::TimedOut);
            tracing::warn!(timeout = ?limit, "Claude request timed out, killing process");
            stop.cancel();
            kill(&mut child, &readers).await;
            Err(ClaudeError::Timeout(limit))
        }
        Outcome::Cancelled => {
            handle.transition(ProcessState::Cancelled);
            tracing::info!("Claude request cancelled, killing process");
            kill(&mut child, &readers).await;
            Err(ClaudeError::Cancelled)
        }
    }
}

fn spawn_child(command: &PreparedCommand) -> std::io::Result<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &command.cwd {
        cmd.current_dir(cwd);
    }

    for (k, v) in &command.env {
        cmd.env(k, v);
    }

    cmd.spawn()
}

fn missing_pipe(name: &str) -> ClaudeError {
    ClaudeError::Io(std::io::Error::other(format!("child {name} was not captured")))
}

async fn wait_and_collect(
    child: &mut Child,
    stdout_task: JoinHandle<String>,
    stderr_task: JoinHandle<String>,
) -> std::io::Result<(ExitStatus, String, String)> {
    let status = child.wait().await?;
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    Ok((status, stdout, stderr))
}

async fn kill(child: &mut Child, readers: &[tokio::task::AbortHandle]) {
    for reader in readers {
        reader.abort();
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill Claude process");
    }
}

async fn drain_stdout(
    stream: impl AsyncRead + Unpin,
    sinks: StreamSinks,
    stop: CancellationToken,
) -> String {
    let mut reader = BufReader::new(stream);
    let mut output = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) if stop.is_cancelled() => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\n', '\r']);
                tracing::trace!(line = %text, "stdout");
                sinks.forward(text);
                output.extend_from_slice(&line);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stopped reading stdout");
                break;
            }
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}

async fn drain_stderr(stream: impl AsyncRead + Unpin) -> String {
    let mut reader = BufReader::new(stream);
    let mut output = Vec::new();
    loop {
        let start = output.len();
        match reader.read_until(b'\n', &mut output).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&output[start..]);
                tracing::debug!(line = %text.trim_end(), "stderr");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stopped reading stderr");
                break;
            }
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}
