//! Shared data types for client configuration, requests and results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "deepseek-v3-250324";

/// Local router endpoint used for every non-GLM model.
pub const DEFAULT_ROUTER_BASE_URL: &str = "http://127.0.0.1:3456";

/// Anthropic-compatible endpoint of the GLM provider.
pub const DEFAULT_GLM_BASE_URL: &str = "https://open.bigmodel.cn/api/anthropic";

/// Default wall-clock limit for one invocation (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Configuration shared by every invocation made through a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Override for the `claude` executable (None = discover).
    pub binary_path: Option<PathBuf>,
    /// Model used when the request leaves it unset.
    pub default_model: String,
    /// Maximum wall-clock duration before the process is killed.
    pub timeout: Duration,
    /// Router configuration file holding the `APIKEY` field.
    ///
    /// `None` means `~/.claude-code-router/config.json`.
    pub router_config_path: Option<PathBuf>,
    /// Base URL the CLI is pointed at for router-backed models.
    pub router_base_url: String,
    /// Base URL the CLI is pointed at for GLM models.
    pub glm_base_url: String,
    /// Auth token for GLM models.
    pub glm_api_key: Option<String>,
    /// Pass `--dangerously-skip-permissions` so the CLI never prompts.
    pub skip_permissions: bool,
    /// Hand the prompt over through a file instead of argv.
    pub prompt_via_file: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            router_config_path: None,
            router_base_url: DEFAULT_ROUTER_BASE_URL.to_string(),
            glm_base_url: DEFAULT_GLM_BASE_URL.to_string(),
            glm_api_key: None,
            skip_permissions: true,
            prompt_via_file: true,
        }
    }
}

/// One prompt to run through the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Prompt text, passed through unmodified.
    pub prompt: String,
    /// Model identifier; falls back to [`ClientConfig::default_model`].
    pub model: Option<String>,
    /// Working directory of the child process and home of the prompt file.
    pub working_dir: Option<PathBuf>,
    /// Session to attach the conversation to.
    pub session_id: Option<String>,
}

impl InvocationRequest {
    /// Creates a request for `prompt` with every optional field unset.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the session identifier.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }
}

/// Token counts reported by the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Final answer text.
    pub content: String,
    /// Model that actually served the request, `"unknown"` if not reported.
    pub model: String,
    /// Token usage.
    pub usage: TokenUsage,
    /// RFC 3339 UTC time at which the result was assembled.
    pub timestamp: String,
    /// Why generation stopped (`"stop"` for a successful result event).
    pub finish_reason: Option<String>,
    /// Session id reported by the CLI, usable with `--session-id`.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Wall-clock duration of the process in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Every JSON event parsed from stdout, in arrival order.
    #[serde(default)]
    pub stream_messages: Option<Vec<serde_json::Value>>,
}

/// Lifecycle of the child process behind one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Not started yet.
    Idle,
    /// The OS accepted the spawn request.
    Spawned,
    /// Stdin is closed and output is being collected.
    Running,
    /// The process exited on its own with the given code (`-1` if killed by a signal).
    Exited(i32),
    /// The process was killed because the timeout elapsed.
    TimedOut,
    /// The process was killed on request.
    Cancelled,
    /// The process could not be started.
    SpawnError,
}

impl ProcessState {
    /// Returns `true` once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Exited(_) | Self::TimedOut | Self::Cancelled | Self::SpawnError
        )
    }
}

/// Individual feature that the Claude CLI may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// The `stream-json` output format.
    StreamJson,
    /// The `--verbose` flag, required alongside `stream-json` in print mode.
    Verbose,
    /// The `--dangerously-skip-permissions` flag.
    SkipPermissions,
    /// The `--session-id` flag.
    SessionId,
    /// The `--model` flag.
    Model,
}

/// Set of features detected from the Claude CLI help text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Features present in this CLI build.
    pub features: BTreeSet<Feature>,
}

impl Capabilities {
    /// Returns `true` if the given feature is supported.
    #[must_use]
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Report produced by [`crate::probe`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Executable that was probed.
    pub program: PathBuf,
    /// Version string reported by `claude --version`.
    pub version: String,
    /// Detected CLI capabilities.
    pub capabilities: Capabilities,
}
