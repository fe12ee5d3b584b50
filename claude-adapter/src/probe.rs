//! Version and capability probing of the Claude CLI.

use crate::error::ClaudeError;
use crate::types::{Capabilities, Feature, ProbeReport};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

const FEATURE_CHECKS: &[(Feature, &str)] = &[
    (Feature::StreamJson, "stream-json"),
    (Feature::Verbose, "--verbose"),
    (Feature::SkipPermissions, "--dangerously-skip-permissions"),
    (Feature::SessionId, "--session-id"),
    (Feature::Model, "--model"),
];

/// Detects which of the flags this crate relies on appear in `help_text`.
#[must_use]
pub fn detect_capabilities(help_text: &str) -> Capabilities {
    let features = FEATURE_CHECKS
        .iter()
        .filter(|(_, pattern)| help_text.contains(pattern))
        .map(|(feature, _)| *feature)
        .collect();
    Capabilities { features }
}

/// Runs `claude --version` and `claude --help` against `program`.
///
/// # Errors
///
/// `SpawnFailed` if the program cannot start, `VersionCheckFailed` if
/// `--version` fails or does not answer within the probe timeout.
pub async fn probe(program: &Path) -> Result<ProbeReport, ClaudeError> {
    let version_output = run_quiet(program, "--version").await?;
    if !version_output.status.success() {
        return Err(ClaudeError::VersionCheckFailed(
            String::from_utf8_lossy(&version_output.stderr).trim().to_string(),
        ));
    }
    let version = String::from_utf8_lossy(&version_output.stdout)
        .trim()
        .to_string();

    let help_output = run_quiet(program, "--help").await?;
    let capabilities = detect_capabilities(&String::from_utf8_lossy(&help_output.stdout));

    for (feature, flag) in FEATURE_CHECKS {
        if !capabilities.supports(*feature) {
            tracing::warn!(flag, "Claude CLI does not advertise a flag this adapter uses");
        }
    }

    Ok(ProbeReport {
        program: program.to_path_buf(),
        version,
        capabilities,
    })
}

async fn run_quiet(program: &Path, flag: &str) -> Result<std::process::Output, ClaudeError> {
    let child = Command::new(program)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ClaudeError::SpawnFailed {
            program: program.to_path_buf(),
            source,
        })?;

    tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| ClaudeError::VersionCheckFailed(format!("`{flag}` did not answer in time")))?
        .map_err(ClaudeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_flags_from_help() {
        let help = "Options:\n  --output-format <format>  \"text\", \"json\", or \"stream-json\"\n  --verbose\n  --model <model>\n";
        let caps = detect_capabilities(help);
        assert!(caps.supports(Feature::StreamJson));
        assert!(caps.supports(Feature::Verbose));
        assert!(caps.supports(Feature::Model));
        assert!(!caps.supports(Feature::SessionId));
        assert!(!caps.supports(Feature::SkipPermissions));
    }
}
