use crate::error::Result;
use crate::observe::normalize_error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use ward_core::paths::WardPaths;
use ward_core::sideband;
use ward_core::state::{SessionState, StateStore};
use ward_types::HookPayload;

static TEST_RUNNER: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bcargo\s+test\b",
        r"\bpytest\b",
        r"\bpython\s+-m\s+pytest\b",
        r"\bnpm\s+(run\s+)?test\b",
        r"\bgo\s+test\b",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

fn is_memory_tool(tool: &str) -> bool {
    (tool.starts_with("mcp__") || tool.starts_with("mcp_")) && tool.contains("memory")
}

/// The single writer of durable session state.
///
/// The enforcer only ever emits sideband patches; this component folds
/// them into the state file during the matching PostToolUse invocation
/// (or a manual `ward track`), adds the post-event bookkeeping, and
/// performs the one atomic save.
#[derive(Debug, Clone)]
pub struct Tracker {
    paths: WardPaths,
    store: StateStore,
}

impl Tracker {
    pub fn new(paths: WardPaths) -> Self {
        let store = StateStore::new(paths.clone());
        Tracker { paths, store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Fold a pending sideband into `state` and delete it. Returns
    /// whether one existed.
    pub fn fold_sideband(
        &self,
        session_id: &str,
        state: &mut SessionState,
        now: f64,
    ) -> Result<bool> {
        let Some(patch) = sideband::read_sideband(&self.paths, session_id) else {
            return Ok(false);
        };
        state.apply_patch(&patch, now);
        sideband::delete_sideband(&self.paths, session_id)?;
        Ok(true)
    }

    /// Post-event bookkeeping: call counters, file lists, verification
    /// flow, error-pattern tallies, and the memory freshness stamp.
    pub fn record_post_event(&self, payload: &HookPayload, state: &mut SessionState, now: f64) {
        state.total_tool_calls += 1;
        *state
            .tool_call_counts
            .entry(payload.tool_name.clone())
            .or_insert(0) += 1;

        let file_path = payload
            .tool_input
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or("");

        match payload.tool_name.as_str() {
            "Read" if !file_path.is_empty() => state.note_file_read(file_path),
            "Edit" | "Write" | "NotebookEdit" if !file_path.is_empty() => {
                state.note_file_edited(file_path);
                if !state.pending_verification.iter().any(|p| p == file_path) {
                    state.pending_verification.push(file_path.to_string());
                }
            }
            "Bash" => self.record_bash_outcome(payload, state),
            _ => {}
        }

        if is_memory_tool(&payload.tool_name) {
            state.memory_last_queried = now;
        }
    }

    fn record_bash_outcome(&self, payload: &HookPayload, state: &mut SessionState) {
        let command = payload
            .tool_input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("");
        let response_text = match payload.tool_response.as_ref() {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Object(obj)) => {
                let stdout = obj.get("stdout").and_then(Value::as_str).unwrap_or("");
                let stderr = obj.get("stderr").and_then(Value::as_str).unwrap_or("");
                format!("{stdout}\n{stderr}")
            }
            _ => String::new(),
        };
        let exit_code = payload
            .tool_response
            .as_ref()
            .and_then(|value| value.get("exit_code"))
            .and_then(Value::as_i64);

        if let Some(pattern) = normalize_error(&response_text) {
            *state
                .error_pattern_counts
                .entry(pattern.to_string())
                .or_insert(0) += 1;
        }

        let ran_tests = TEST_RUNNER.iter().any(|runner| runner.is_match(command));
        if ran_tests && exit_code == Some(0) {
            let newly_verified = std::mem::take(&mut state.pending_verification);
            for entry in newly_verified {
                if !state.verified_fixes.iter().any(|v| *v == entry) {
                    state.verified_fixes.push(entry);
                }
            }
        }
    }

    /// The tracker-only durable save.
    pub fn save(&self, session_id: &str, state: &mut SessionState, now: f64) -> Result<()> {
        self.store.save(session_id, state, now)?;
        Ok(())
    }

    /// Standalone merge for `ward track`: load, fold, save.
    pub fn merge(&self, session_id: &str, now: f64) -> Result<bool> {
        let mut state = self.store.load(session_id, now);
        let merged = self.fold_sideband(session_id, &mut state, now)?;
        if merged {
            self.save(session_id, &mut state, now)?;
        }
        Ok(merged)
    }
}
