use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_cache_enabled() -> bool {
    true
}

fn default_gate_deadline_ms() -> f64 {
    150.0
}

fn default_audit_trail_cap() -> usize {
    5_000
}

fn default_capture_queue_cap() -> usize {
    10_000
}

fn default_gc_max_age_days() -> u64 {
    14
}

/// Optional operator knobs read from `<root>/config.toml`.
///
/// A missing file yields defaults. The security profile is NOT here; it
/// lives in session state so the agent's own session can select it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    #[serde(default = "default_gate_deadline_ms")]
    pub gate_deadline_ms: f64,

    #[serde(default = "default_audit_trail_cap")]
    pub audit_trail_cap: usize,

    #[serde(default = "default_capture_queue_cap")]
    pub capture_queue_cap: usize,

    #[serde(default = "default_gc_max_age_days")]
    pub gc_max_age_days: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_enabled: default_cache_enabled(),
            gate_deadline_ms: default_gate_deadline_ms(),
            audit_trail_cap: default_audit_trail_cap(),
            capture_queue_cap: default_capture_queue_cap(),
            gc_max_age_days: default_gc_max_age_days(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
