use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("Claude executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to check version: {0}")]
    VersionCheckFailed(String),

    #[error("Failed to start Claude ({}): {source}", program.display())]
    SpawnFailed {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Claude request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Claude request was cancelled")]
    Cancelled,

    #[error("Claude command failed (code {exit_code}): {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClaudeError {
    /// Returns `true` for failures where the process never ran to completion
    /// because this side stopped it.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}
