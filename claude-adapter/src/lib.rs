//! Rust adapter for driving the Claude Code CLI as a subprocess.
//!
//! A [`ClaudeClient`] turns an [`InvocationRequest`] into one `claude -p`
//! run: it picks the provider endpoint from the model name, writes the prompt
//! to a file, spawns the CLI with stdin closed, streams `stream-json` events
//! to the caller while the process runs, and reduces the output into an
//! [`InvocationResult`] once it exits.

/// Command-line argument and environment construction.
pub mod cmd;
/// Discovery and resolution of the Claude CLI executable path.
pub mod discovery;
/// Error types returned by adapter operations.
pub mod error;
/// Version and capability probing of the Claude CLI.
pub mod probe;
/// Subprocess execution with streaming, timeouts and cancellation.
pub mod process;
/// Reduction of CLI output into a result.
pub mod response;
/// Provider routing and router config access.
pub mod routing;
/// Typed `stream-json` events.
pub mod stream;
/// Shared data types for configuration, requests and results.
pub mod types;

pub use discovery::{discover_claude, CLAUDE_BIN_ENV_VAR};
pub use error::ClaudeError;
pub use probe::probe;
pub use process::{run_claude, InvocationHandle, StreamSinks};
pub use routing::{Provider, Route};
pub use stream::{ContentBlock, StreamEvent};
pub use types::*;

use std::path::PathBuf;
use tokio::sync::mpsc;

/// High-level client for the Claude Code CLI.
///
/// Holds no per-invocation state: every call gets its own process and
/// [`InvocationHandle`], so concurrent calls never interfere.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    program: PathBuf,
    config: ClientConfig,
}

impl ClaudeClient {
    /// Creates a client, discovering the executable from
    /// `config.binary_path` and the usual locations.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::ExecutableNotFound` if an explicit binary path
    /// was configured but does not exist.
    pub fn new(config: ClientConfig) -> Result<Self, ClaudeError> {
        let program = discover_claude(config.binary_path.clone())?;
        Ok(Self { program, config })
    }

    /// Creates a client for an already resolved executable.
    #[must_use]
    pub fn with_program(program: PathBuf, config: ClientConfig) -> Self {
        Self { program, config }
    }

    /// Executable this client spawns.
    #[must_use]
    pub const fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Applies `update` to the configuration used by later calls.
    pub fn update_config(&mut self, update: impl FnOnce(&mut ClientConfig)) {
        update(&mut self.config);
    }

    /// Model a request will run with.
    #[must_use]
    pub fn resolve_model<'a>(&'a self, request: &'a InvocationRequest) -> &'a str {
        request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.default_model.as_str())
    }

    /// Sends a prompt and returns the final result, forwarding parsed events
    /// to `events` while the CLI runs.
    ///
    /// # Errors
    ///
    /// See [`run_claude`].
    pub async fn send_message(
        &self,
        request: &InvocationRequest,
        events: Option<mpsc::UnboundedSender<StreamEvent>>,
    ) -> Result<InvocationResult, ClaudeError> {
        let sinks = StreamSinks { events, text: None };
        self.execute(request, sinks, &InvocationHandle::new()).await
    }

    /// Sends a prompt, forwarding assistant text chunks to `chunks` as they
    /// arrive.
    ///
    /// # Errors
    ///
    /// See [`run_claude`].
    pub async fn stream_message(
        &self,
        request: &InvocationRequest,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<InvocationResult, ClaudeError> {
        self.execute(request, StreamSinks::text(chunks), &InvocationHandle::new())
            .await
    }

    /// Runs one invocation under `handle`; call [`InvocationHandle::cancel`]
    /// on a clone to kill it.
    ///
    /// # Errors
    ///
    /// See [`run_claude`].
    pub async fn execute(
        &self,
        request: &InvocationRequest,
        sinks: StreamSinks,
        handle: &InvocationHandle,
    ) -> Result<InvocationResult, ClaudeError> {
        let model = self.resolve_model(request);
        let route = routing::select_route(model, &self.config).await;
        let command = cmd::prepare(
            &self.program,
            &request.prompt,
            model,
            request.working_dir.as_deref(),
            request.session_id.as_deref(),
            &route,
            &self.config,
        );
        tracing::debug!(
            program = %command.program.display(),
            args = ?command.args,
            prompt_file = ?command.prompt.path(),
            "Executing Claude command"
        );
        run_claude(&command, self.config.timeout, sinks, handle).await
    }

    /// Probes the configured executable.
    ///
    /// # Errors
    ///
    /// See [`probe`].
    pub async fn probe(&self) -> Result<ProbeReport, ClaudeError> {
        probe::probe(&self.program).await
    }
}
