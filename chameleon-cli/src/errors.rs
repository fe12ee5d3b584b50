use thiserror::Error;

/// Errors surfaced by the `chameleon` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error from the Claude adapter.
    #[error("{0}")]
    Claude(#[from] chameleon_claude::ClaudeError),

    /// The invocation needs a prompt and none was given.
    #[error("No prompt given: pass it as an argument, with --file, or on stdin")]
    MissingPrompt,

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow error.
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}
