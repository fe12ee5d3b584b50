//! Command-line argument and environment builder for Claude CLI invocations.

use crate::routing::Route;
use crate::types::ClientConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// How the prompt reaches the CLI.
#[derive(Debug)]
pub enum PromptSource {
    /// Written to a file referenced as `@<path>`; removed when dropped.
    File(NamedTempFile),
    /// Passed verbatim as the `-p` argument.
    Inline,
}

impl PromptSource {
    /// Path of the prompt file, if one was written.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(file) => Some(file.path()),
            Self::Inline => None,
        }
    }
}

/// Everything needed to spawn one CLI process.
#[derive(Debug)]
pub struct PreparedCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory of the child.
    pub cwd: Option<PathBuf>,
    /// Keeps the prompt file alive for the lifetime of the run.
    pub prompt: PromptSource,
}

impl PreparedCommand {
    /// A command with no CLI-specific arguments, for running arbitrary programs.
    #[must_use]
    pub fn raw(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            cwd: None,
            prompt: PromptSource::Inline,
        }
    }
}

/// Writes `prompt` to a fresh `claude_prompt_*.txt` file inside `dir`.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be created or written.
pub fn write_prompt_file(dir: &Path, prompt: &str) -> std::io::Result<NamedTempFile> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("claude_prompt_")
        .suffix(".txt")
        .tempfile_in(dir)?;
    file.write_all(prompt.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Decides how the prompt is handed over, falling back to inline on any
/// write failure.
#[must_use]
pub fn prompt_source(prompt: &str, dir: Option<&Path>, via_file: bool) -> PromptSource {
    if !via_file {
        return PromptSource::Inline;
    }
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok());
    let Some(dir) = dir else {
        tracing::warn!("No directory for the prompt file, passing prompt as argument");
        return PromptSource::Inline;
    };
    match write_prompt_file(&dir, prompt) {
        Ok(file) => PromptSource::File(file),
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "Could not write temp prompt file, falling back to direct argument"
            );
            PromptSource::Inline
        }
    }
}

/// Builds the argument list for a `claude -p` invocation.
#[must_use]
pub fn build_args(
    prompt: &str,
    source: &PromptSource,
    model: &str,
    session_id: Option<&str>,
    skip_permissions: bool,
) -> Vec<OsString> {
    let mut args = Vec::new();

    args.push(OsString::from("-p"));
    match source.path() {
        Some(path) => {
            let mut reference = OsString::from("@");
            reference.push(path.as_os_str());
            args.push(reference);
        }
        None => args.push(OsString::from(prompt)),
    }

    args.push(OsString::from("--model"));
    args.push(OsString::from(model));

    args.push(OsString::from("--output-format"));
    args.push(OsString::from("stream-json"));
    args.push(OsString::from("--verbose"));

    if skip_permissions {
        args.push(OsString::from("--dangerously-skip-permissions"));
    }

    if let Some(id) = session_id {
        args.push(OsString::from("--session-id"));
        args.push(OsString::from(id));
    }

    args
}

/// Builds the environment overlay for `route`.
#[must_use]
pub fn build_env(route: &Route, timeout: Duration) -> Vec<(String, String)> {
    let mut env = vec![
        ("ANTHROPIC_API_KEY".to_string(), String::new()),
        ("ANTHROPIC_BASE_URL".to_string(), route.base_url.clone()),
        ("NO_PROXY".to_string(), route.no_proxy.clone()),
        ("DISABLE_TELEMETRY".to_string(), "true".to_string()),
        ("DISABLE_COST_WARNINGS".to_string(), "true".to_string()),
        ("API_TIMEOUT_MS".to_string(), timeout.as_millis().to_string()),
    ];
    if let Some(token) = &route.auth_token {
        env.push(("ANTHROPIC_AUTH_TOKEN".to_string(), token.clone()));
    }
    env
}

/// Assembles the full command for one request.
#[must_use]
pub fn prepare(
    program: &Path,
    prompt: &str,
    model: &str,
    working_dir: Option<&Path>,
    session_id: Option<&str>,
    route: &Route,
    config: &ClientConfig,
) -> PreparedCommand {
    let source = prompt_source(prompt, working_dir, config.prompt_via_file);
    let args = build_args(prompt, &source, model, session_id, config.skip_permissions);
    PreparedCommand {
        program: program.to_path_buf(),
        args,
        env: build_env(route, config.timeout),
        cwd: working_dir.map(Path::to_path_buf),
        prompt: source,
    }
}
