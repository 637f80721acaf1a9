use crate::error::Result;
use crate::fsio;
use crate::paths::WardPaths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current schema version; `load` rewrites older documents to this.
pub const STATE_VERSION: u64 = 3;

/// Rolling window the rate-limit gate inspects.
pub const RATE_WINDOW_S: f64 = 120.0;

const TIMING_STATS_CAP: usize = 20;
const CANARY_TS_CAP: usize = 600;
const CANARY_SEQ_CAP: usize = 10;
const BLOCK_OUTCOMES_CAP: usize = 100;

/// Per-gate latency aggregate kept both in session state and in the
/// cross-session timing file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimingStat {
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl TimingStat {
    pub fn record(&mut self, ms: f64) {
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.total_ms += ms;
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// One historical block, fed back into the router's Q-table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockOutcome {
    pub gate: String,
    pub tool: String,
    pub reason: String,
    pub ts: f64,
}

/// The per-session mutable record.
///
/// Every field has a typed default; unknown fields from older schemas are
/// dropped and mismatched fields are replaced on load (schema-on-read:
/// the JSON document on disk stays the source of truth and the loader
/// coerces, so old state files never wedge an invocation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "_version")]
    pub version: u64,
    pub session_start: f64,
    pub total_tool_calls: u64,
    pub tool_call_counts: BTreeMap<String, u64>,
    pub files_read: Vec<String>,
    pub files_edited: Vec<String>,
    pub pending_verification: Vec<String>,
    pub verified_fixes: Vec<String>,
    pub memory_last_queried: f64,
    pub rate_window_timestamps: Vec<f64>,
    pub gate_timing_stats: BTreeMap<String, TimingStat>,
    pub gate_block_outcomes: Vec<BlockOutcome>,
    pub canary_total_calls: u64,
    pub canary_tool_counts: BTreeMap<String, u64>,
    pub canary_seen_tools: Vec<String>,
    pub canary_short_timestamps: Vec<f64>,
    pub canary_long_timestamps: Vec<f64>,
    pub canary_recent_seq: Vec<String>,
    pub canary_size_mean: f64,
    pub security_profile: String,
    pub gate6_warn_count: u64,
    pub injection_attempts: u64,
    pub error_pattern_counts: BTreeMap<String, u64>,
    pub model_agent_usage: BTreeMap<String, u64>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            version: STATE_VERSION,
            session_start: 0.0,
            total_tool_calls: 0,
            tool_call_counts: BTreeMap::new(),
            files_read: Vec::new(),
            files_edited: Vec::new(),
            pending_verification: Vec::new(),
            verified_fixes: Vec::new(),
            memory_last_queried: 0.0,
            rate_window_timestamps: Vec::new(),
            gate_timing_stats: BTreeMap::new(),
            gate_block_outcomes: Vec::new(),
            canary_total_calls: 0,
            canary_tool_counts: BTreeMap::new(),
            canary_seen_tools: Vec::new(),
            canary_short_timestamps: Vec::new(),
            canary_long_timestamps: Vec::new(),
            canary_recent_seq: Vec::new(),
            canary_size_mean: 0.0,
            security_profile: "balanced".to_string(),
            gate6_warn_count: 0,
            injection_attempts: 0,
            error_pattern_counts: BTreeMap::new(),
            model_agent_usage: BTreeMap::new(),
        }
    }
}

/// Pull one field out of a raw document, falling back to the given
/// default (and noting a warning) when the stored type does not match.
fn field<T: serde::de::DeserializeOwned>(
    obj: &Map<String, Value>,
    name: &str,
    default: T,
    warnings: &mut Vec<String>,
) -> T {
    match obj.get(name) {
        None => default,
        Some(value) => match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => parsed,
            Err(_) => {
                warnings.push(name.to_string());
                default
            }
        },
    }
}

impl SessionState {
    pub fn new(now: f64) -> Self {
        SessionState {
            session_start: now,
            ..SessionState::default()
        }
    }

    /// Migrate a raw on-disk document to the current schema.
    ///
    /// Idempotent: running the result back through changes nothing.
    /// Returns the names of fields whose stored type had to be discarded.
    pub fn from_value(value: &Value, now: f64) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let defaults = SessionState::new(now);
        let Some(obj) = value.as_object() else {
            warnings.push("_document".to_string());
            return (defaults, warnings);
        };
        let w = &mut warnings;

        let read_version = field(obj, "_version", STATE_VERSION, w);
        let state = SessionState {
            version: read_version.max(STATE_VERSION),
            session_start: field(obj, "session_start", defaults.session_start, w),
            total_tool_calls: field(obj, "total_tool_calls", 0, w),
            tool_call_counts: field(obj, "tool_call_counts", BTreeMap::new(), w),
            files_read: field(obj, "files_read", Vec::new(), w),
            files_edited: field(obj, "files_edited", Vec::new(), w),
            pending_verification: field(obj, "pending_verification", Vec::new(), w),
            verified_fixes: field(obj, "verified_fixes", Vec::new(), w),
            memory_last_queried: field(obj, "memory_last_queried", 0.0, w),
            rate_window_timestamps: field(obj, "rate_window_timestamps", Vec::new(), w),
            gate_timing_stats: field(obj, "gate_timing_stats", BTreeMap::new(), w),
            gate_block_outcomes: field(obj, "gate_block_outcomes", Vec::new(), w),
            canary_total_calls: field(obj, "canary_total_calls", 0, w),
            canary_tool_counts: field(obj, "canary_tool_counts", BTreeMap::new(), w),
            canary_seen_tools: field(obj, "canary_seen_tools", Vec::new(), w),
            canary_short_timestamps: field(obj, "canary_short_timestamps", Vec::new(), w),
            canary_long_timestamps: field(obj, "canary_long_timestamps", Vec::new(), w),
            canary_recent_seq: field(obj, "canary_recent_seq", Vec::new(), w),
            canary_size_mean: field(obj, "canary_size_mean", 0.0, w),
            security_profile: field(obj, "security_profile", "balanced".to_string(), w),
            gate6_warn_count: field(obj, "gate6_warn_count", 0, w),
            injection_attempts: field(obj, "injection_attempts", 0, w),
            error_pattern_counts: field(obj, "error_pattern_counts", BTreeMap::new(), w),
            model_agent_usage: field(obj, "model_agent_usage", BTreeMap::new(), w),
        };
        (state, warnings)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Keys whose values changed relative to `baseline`, as a sideband
    /// patch. Underscore-prefixed keys never appear in a patch.
    pub fn diff(&self, baseline: &SessionState) -> Map<String, Value> {
        let mut patch = Map::new();
        let (Value::Object(current), Value::Object(before)) =
            (self.to_value(), baseline.to_value())
        else {
            return patch;
        };
        for (key, value) in current {
            if key.starts_with('_') {
                continue;
            }
            if before.get(&key) != Some(&value) {
                patch.insert(key, value);
            }
        }
        patch
    }

    /// Overlay a sideband patch. Underscore-prefixed keys are skipped
    /// (the `_sideband_refreshed` sentinel carries no state). Merging is
    /// deterministic and order-independent for any single key: last
    /// write of that key wins wholesale.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>, now: f64) {
        let mut merged = match self.to_value() {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if key.starts_with('_') {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        let (next, _warnings) = SessionState::from_value(&Value::Object(merged), now);
        *self = next;
    }

    /// Prune every bounded collection to its cap, keeping the newest or
    /// highest-value entries, and restore cross-field invariants.
    pub fn enforce_caps(&mut self, now: f64) {
        self.rate_window_timestamps
            .retain(|ts| now - *ts <= RATE_WINDOW_S);

        if self.gate_timing_stats.len() > TIMING_STATS_CAP {
            let mut by_count: Vec<(String, TimingStat)> = std::mem::take(&mut self.gate_timing_stats)
                .into_iter()
                .collect();
            by_count.sort_by(|a, b| b.1.count.cmp(&a.1.count));
            by_count.truncate(TIMING_STATS_CAP);
            self.gate_timing_stats = by_count.into_iter().collect();
        }

        truncate_to_newest(&mut self.canary_short_timestamps, CANARY_TS_CAP);
        truncate_to_newest(&mut self.canary_long_timestamps, CANARY_TS_CAP);
        truncate_to_newest(&mut self.canary_recent_seq, CANARY_SEQ_CAP);
        truncate_to_newest(&mut self.gate_block_outcomes, BLOCK_OUTCOMES_CAP);

        let verified = self.verified_fixes.clone();
        self.pending_verification
            .retain(|entry| !verified.contains(entry));
    }

    /// Dedup-insert into `files_read`.
    pub fn note_file_read(&mut self, path: &str) {
        if !self.files_read.iter().any(|p| p == path) {
            self.files_read.push(path.to_string());
        }
    }

    /// Dedup-insert into `files_edited`.
    pub fn note_file_edited(&mut self, path: &str) {
        if !self.files_edited.iter().any(|p| p == path) {
            self.files_edited.push(path.to_string());
        }
    }

    pub fn has_read(&self, path: &str) -> bool {
        self.files_read.iter().any(|p| p == path)
    }

    pub fn record_timing(&mut self, gate_id: &str, ms: f64) {
        self.gate_timing_stats
            .entry(gate_id.to_string())
            .or_default()
            .record(ms);
    }

    pub fn record_block_outcome(&mut self, gate: &str, tool: &str, reason: &str, ts: f64) {
        self.gate_block_outcomes.push(BlockOutcome {
            gate: gate.to_string(),
            tool: tool.to_string(),
            reason: reason.to_string(),
            ts,
        });
    }
}

fn truncate_to_newest<T>(entries: &mut Vec<T>, cap: usize) {
    if entries.len() > cap {
        entries.drain(..entries.len() - cap);
    }
}

/// Disk access for session state.
///
/// `load` is open to everyone; `save` must only ever be called from the
/// tracker path; the enforcement pipeline communicates through the
/// sideband instead.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: WardPaths,
}

impl StateStore {
    pub fn new(paths: WardPaths) -> Self {
        StateStore { paths }
    }

    /// Load and migrate; missing or corrupt files fall back to a fresh
    /// record for the session.
    pub fn load(&self, session_id: &str, now: f64) -> SessionState {
        let path = self.paths.state_file(session_id);
        match fsio::read_json_lenient(&path) {
            None => SessionState::new(now),
            Some(value) => {
                let (state, warnings) = SessionState::from_value(&value, now);
                if !warnings.is_empty() {
                    eprintln!(
                        "ward: state {} migrated with {} replaced field(s): {}",
                        session_id,
                        warnings.len(),
                        warnings.join(", ")
                    );
                }
                state
            }
        }
    }

    /// Tracker-only durable write: caps enforced, then temp + rename.
    pub fn save(&self, session_id: &str, state: &mut SessionState, now: f64) -> Result<()> {
        state.enforce_caps(now);
        fsio::write_json_atomic(&self.paths.state_file(session_id), &state.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_balanced_and_versioned() {
        let state = SessionState::default();
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.security_profile, "balanced");
    }

    #[test]
    fn migration_replaces_mismatched_fields() {
        let raw = json!({
            "_version": 1,
            "total_tool_calls": "lots",
            "files_read": ["/tmp/a.py"],
            "unknown_legacy_field": {"x": 1},
        });
        let (state, warnings) = SessionState::from_value(&raw, 100.0);
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.total_tool_calls, 0);
        assert_eq!(state.files_read, vec!["/tmp/a.py".to_string()]);
        assert_eq!(warnings, vec!["total_tool_calls".to_string()]);
    }

    #[test]
    fn migration_is_idempotent() {
        let raw = json!({"_version": 2, "total_tool_calls": 7, "session_start": 50.0});
        let (once, _) = SessionState::from_value(&raw, 100.0);
        let (twice, warnings) = SessionState::from_value(&once.to_value(), 200.0);
        assert_eq!(once, twice);
        assert!(warnings.is_empty());
    }

    #[test]
    fn version_is_monotone() {
        let raw = json!({"_version": 99});
        let (state, _) = SessionState::from_value(&raw, 0.0);
        assert_eq!(state.version, 99);
    }

    #[test]
    fn caps_prune_every_bounded_collection() {
        let mut state = SessionState::default();
        let now = 1_000.0;
        state.rate_window_timestamps = vec![now - 300.0, now - 121.0, now - 10.0, now];
        for i in 0..25 {
            let stat = state
                .gate_timing_stats
                .entry(format!("gate_{i:02}"))
                .or_default();
            for _ in 0..=i {
                stat.record(1.0);
            }
        }
        state.canary_short_timestamps = (0..700).map(|i| i as f64).collect();
        state.canary_long_timestamps = (0..700).map(|i| i as f64).collect();
        state.canary_recent_seq = (0..15).map(|i| format!("fp{i}")).collect();
        for i in 0..120 {
            state.record_block_outcome("gate_01", "Edit", "r", i as f64);
        }

        state.enforce_caps(now);

        assert_eq!(state.rate_window_timestamps, vec![now - 10.0, now]);
        assert_eq!(state.gate_timing_stats.len(), 20);
        // Highest-count entries survive
        assert!(state.gate_timing_stats.contains_key("gate_24"));
        assert!(!state.gate_timing_stats.contains_key("gate_00"));
        assert_eq!(state.canary_short_timestamps.len(), 600);
        assert_eq!(state.canary_short_timestamps[0], 100.0);
        assert_eq!(state.canary_recent_seq.len(), 10);
        assert_eq!(state.canary_recent_seq[0], "fp5");
        assert_eq!(state.gate_block_outcomes.len(), 100);
        assert_eq!(state.gate_block_outcomes[0].ts, 20.0);
    }

    #[test]
    fn verified_fixes_disjoint_from_pending() {
        let mut state = SessionState::default();
        state.pending_verification = vec!["a.py".to_string(), "b.py".to_string()];
        state.verified_fixes = vec!["a.py".to_string()];
        state.enforce_caps(0.0);
        assert_eq!(state.pending_verification, vec!["b.py".to_string()]);
    }

    #[test]
    fn timing_stat_invariants_hold() {
        let mut stat = TimingStat::default();
        stat.record(5.0);
        stat.record(2.0);
        stat.record(9.0);
        assert_eq!(stat.count, 3);
        assert!(stat.min_ms <= stat.max_ms);
        assert_eq!(stat.min_ms, 2.0);
        assert_eq!(stat.max_ms, 9.0);
        assert_eq!(stat.total_ms, 16.0);
    }

    #[test]
    fn diff_captures_only_mutated_keys() {
        let baseline = SessionState::new(10.0);
        let mut state = baseline.clone();
        state.total_tool_calls = 1;
        state.note_file_read("/tmp/x.py");

        let patch = state.diff(&baseline);
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["total_tool_calls"], json!(1));
        assert_eq!(patch["files_read"], json!(["/tmp/x.py"]));
        assert!(!patch.contains_key("_version"));
    }

    #[test]
    fn apply_patch_skips_underscore_keys() {
        let mut state = SessionState::new(10.0);
        let mut patch = Map::new();
        patch.insert("_version".to_string(), json!(1));
        patch.insert("_sideband_refreshed".to_string(), json!(true));
        patch.insert("gate6_warn_count".to_string(), json!(3));
        state.apply_patch(&patch, 10.0);
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.gate6_warn_count, 3);
    }

    #[test]
    fn store_load_missing_returns_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(WardPaths::new(dir.path()));
        let state = store.load("sess-a", 42.0);
        assert_eq!(state.session_start, 42.0);
        assert!(!dir.path().join("state/sess-a.json").exists());
    }

    #[test]
    fn store_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(WardPaths::new(dir.path()));
        let mut state = SessionState::new(5.0);
        state.note_file_read("/tmp/x.py");
        state.total_tool_calls = 9;
        store.save("sess-b", &mut state, 5.0).unwrap();

        let loaded = store.load("sess-b", 99.0);
        assert_eq!(loaded.session_start, 5.0);
        assert_eq!(loaded.total_tool_calls, 9);
        assert!(loaded.has_read("/tmp/x.py"));
    }

    #[test]
    fn store_load_corrupt_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        std::fs::write(dir.path().join("state/sess-c.json"), "{\"tru").unwrap();
        let store = StateStore::new(WardPaths::new(dir.path()));
        let state = store.load("sess-c", 7.0);
        assert_eq!(state, SessionState::new(7.0));
    }
}
