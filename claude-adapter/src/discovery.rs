//! Discovery and resolution of the Claude CLI executable path.
//!
//! Resolution walks an ordered list of [`Strategy`] values. Each strategy only
//! proposes candidate paths from an [`EnvSnapshot`]; a [`FileProbe`] decides
//! which candidates exist, so every strategy can be exercised against a fake
//! filesystem.

use crate::error::ClaudeError;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default Claude CLI binary path.
pub const CLAUDE_BIN_ENV_VAR: &str = "CHAMELEON_CLAUDE_BIN";

/// Name of the executable as installed by npm on this platform.
#[cfg(windows)]
pub const CLAUDE_EXE: &str = "claude.cmd";
/// Name of the executable as installed by npm on this platform.
#[cfg(not(windows))]
pub const CLAUDE_EXE: &str = "claude";

/// Answers whether a candidate path is a usable file.
pub trait FileProbe {
    /// Returns `true` if `path` points at an existing file.
    fn is_file(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileProbe;

impl FileProbe for OsFileProbe {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// The subset of process environment the strategies look at.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, OsString>,
    home: Option<PathBuf>,
}

impl EnvSnapshot {
    /// Captures the variables and home directory of the current process.
    #[must_use]
    pub fn capture() -> Self {
        let vars = [CLAUDE_BIN_ENV_VAR, "PATH", "APPDATA", "USERPROFILE"]
            .into_iter()
            .filter_map(|k| std::env::var_os(k).map(|v| (k.to_string(), v)))
            .collect();
        Self {
            vars,
            home: dirs::home_dir(),
        }
    }

    /// Sets a variable, for building snapshots by hand.
    #[must_use]
    pub fn with_var(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Sets the home directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    fn var(&self, key: &str) -> Option<&OsString> {
        self.vars.get(key).filter(|v| !v.is_empty())
    }
}

/// One way of proposing where the executable might live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// A path configured by the caller.
    Explicit(PathBuf),
    /// The path stored in [`CLAUDE_BIN_ENV_VAR`].
    EnvVar,
    /// Directories npm and the native installer use.
    KnownInstallDirs,
    /// Every directory on `PATH`.
    PathScan,
}

impl Strategy {
    /// Candidate paths proposed by this strategy, most likely first.
    #[must_use]
    pub fn candidates(&self, env: &EnvSnapshot) -> Vec<PathBuf> {
        match self {
            Self::Explicit(path) => vec![path.clone()],
            Self::EnvVar => env
                .var(CLAUDE_BIN_ENV_VAR)
                .map(PathBuf::from)
                .into_iter()
                .collect(),
            Self::KnownInstallDirs => known_install_locations(env),
            Self::PathScan => env
                .var("PATH")
                .map(|path| {
                    std::env::split_paths(path)
                        .filter(|dir| path_entry_eligible(dir))
                        .map(|dir| dir.join(CLAUDE_EXE))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

#[cfg(windows)]
fn known_install_locations(env: &EnvSnapshot) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(appdata) = env.var("APPDATA") {
        locations.push(PathBuf::from(appdata).join("npm").join(CLAUDE_EXE));
    }
    if let Some(profile) = env.var("USERPROFILE") {
        locations.push(
            PathBuf::from(profile)
                .join("AppData")
                .join("Roaming")
                .join("npm")
                .join(CLAUDE_EXE),
        );
    }
    locations
}

#[cfg(not(windows))]
fn known_install_locations(env: &EnvSnapshot) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = &env.home {
        locations.push(home.join(".claude/local").join(CLAUDE_EXE));
        locations.push(home.join(".npm-global/bin").join(CLAUDE_EXE));
        locations.push(home.join(".local/bin").join(CLAUDE_EXE));
    }
    locations.push(PathBuf::from("/usr/local/bin").join(CLAUDE_EXE));
    locations
}

// npm shims on Windows only ever live in npm or node_modules directories;
// other PATH entries may hold unrelated `claude.cmd` files.
#[cfg(windows)]
fn path_entry_eligible(dir: &Path) -> bool {
    let dir = dir.to_string_lossy();
    dir.contains("npm") || dir.contains("node_modules")
}

#[cfg(not(windows))]
const fn path_entry_eligible(_dir: &Path) -> bool {
    true
}

/// Ordered strategy list for the given explicit override.
#[must_use]
pub fn default_strategies(explicit_path: Option<PathBuf>) -> Vec<Strategy> {
    let mut strategies = Vec::with_capacity(4);
    if let Some(path) = explicit_path {
        strategies.push(Strategy::Explicit(path));
    }
    strategies.extend([Strategy::EnvVar, Strategy::KnownInstallDirs, Strategy::PathScan]);
    strategies
}

/// Runs `strategies` in order and returns the first candidate that exists.
///
/// When nothing matches, the bare executable name is returned so that the
/// spawn itself reports the failure.
///
/// # Errors
///
/// Returns `ClaudeError::ExecutableNotFound` when an [`Strategy::Explicit`]
/// path was given but does not exist.
pub fn resolve_with(
    strategies: &[Strategy],
    env: &EnvSnapshot,
    probe: &dyn FileProbe,
) -> Result<PathBuf, ClaudeError> {
    for strategy in strategies {
        let candidates = strategy.candidates(env);
        if let Some(found) = candidates.iter().find(|c| probe.is_file(c)) {
            tracing::debug!(strategy = ?strategy, path = %found.display(), "Found claude executable");
            return Ok(found.clone());
        }
        if let Strategy::Explicit(path) = strategy {
            return Err(ClaudeError::ExecutableNotFound(format!(
                "Explicit path does not exist: {}",
                path.display()
            )));
        }
    }

    tracing::warn!("Could not find an absolute path for {CLAUDE_EXE}, falling back to bare command");
    Ok(PathBuf::from(CLAUDE_EXE))
}

/// Locates the Claude CLI executable on this machine.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `CHAMELEON_CLAUDE_BIN` environment variable.
/// 3. Known install directories.
/// 4. `PATH` entries, then `which` for platform-specific extension lookup.
/// 5. The bare command name.
///
/// # Errors
///
/// Returns `ClaudeError::ExecutableNotFound` when `explicit_path` was given
/// but does not exist.
pub fn discover_claude(explicit_path: Option<PathBuf>) -> Result<PathBuf, ClaudeError> {
    let path = resolve_with(
        &default_strategies(explicit_path),
        &EnvSnapshot::capture(),
        &OsFileProbe,
    )?;
    if path != Path::new(CLAUDE_EXE) {
        return Ok(path);
    }
    Ok(which::which(CLAUDE_EXE).unwrap_or(path))
}
