use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve the ward data root based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. WARD_PATH environment variable (with tilde expansion)
/// 3. XDG data directory (recommended default)
/// 4. ~/.ward (fallback for systems without XDG)
///
/// Resolution happens once at process start; nothing on the per-gate
/// decision path reads the environment.
pub fn resolve_root(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("WARD_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("ward"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".ward"));
    }

    Err(Error::Config(
        "Could not determine ward root: no HOME directory or XDG data directory found".to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Every hookable file location under one root.
#[derive(Debug, Clone)]
pub struct WardPaths {
    root: PathBuf,
}

impl WardPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WardPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn state_file(&self, session_id: &str) -> PathBuf {
        self.state_dir().join(format!("{session_id}.json"))
    }

    pub fn sideband_file(&self, session_id: &str) -> PathBuf {
        self.state_dir().join(format!("{session_id}.sideband.json"))
    }

    pub fn claims_file(&self) -> PathBuf {
        self.root.join(".file_claims.json")
    }

    pub fn circuits_file(&self) -> PathBuf {
        self.root.join(".gate_circuits.json")
    }

    pub fn qtable_file(&self) -> PathBuf {
        self.root.join(".q_table.json")
    }

    pub fn timings_file(&self) -> PathBuf {
        self.root.join(".gate_timings.json")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn capture_queue_file(&self) -> PathBuf {
        self.root.join(".capture_queue.jsonl")
    }

    pub fn canary_log_file(&self) -> PathBuf {
        self.root.join(".canary.jsonl")
    }

    pub fn memory_socket(&self) -> PathBuf {
        self.root.join(".memory.sock")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
