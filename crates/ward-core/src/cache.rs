use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use ward_types::{EventType, GateResult};

pub const CACHE_TTL_S: f64 = 60.0;

/// Stable fingerprint over the decision-relevant subset of a tool's
/// input. Irrelevant fields (replacement text, limits) are excluded so
/// repeated gate checks against the same target hit the cache.
pub fn fingerprint(tool: &str, input: &Value) -> String {
    let canonical = match tool {
        "Edit" | "Write" | "Read" | "NotebookEdit" => input
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        "Bash" => input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        "Task" => format!(
            "{}|{}",
            input.get("subagent_type").and_then(Value::as_str).unwrap_or(""),
            input.get("model").and_then(Value::as_str).unwrap_or(""),
        ),
        "Grep" => format!(
            "{}|{}",
            input.get("pattern").and_then(Value::as_str).unwrap_or(""),
            input.get("path").and_then(Value::as_str).unwrap_or(""),
        ),
        "Glob" => input
            .get("pattern")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        // serde_json objects iterate in sorted key order, so this is
        // already canonical.
        _ => input.to_string(),
    };
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn make_key(gate_id: &str, tool: &str, input: &Value) -> String {
    format!("{gate_id}|{tool}|{}", fingerprint(tool, input))
}

#[derive(Debug, Clone)]
struct Entry {
    result: GateResult,
    stored_at: f64,
}

/// Stats snapshot surfaced through telemetry and `ward stats`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub ttl_s: f64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub cached: usize,
}

/// Short-TTL memoization of non-blocking gate results within a tick.
/// Blocking results are refused at insert time; PostToolUse results are
/// never cached at all.
#[derive(Debug)]
pub struct ResultCache {
    enabled: bool,
    ttl_s: f64,
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new(enabled: bool) -> Self {
        ResultCache {
            enabled,
            ttl_s: CACHE_TTL_S,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, gate_id: &str, tool: &str, input: &Value, now: f64) -> Option<GateResult> {
        if !self.enabled {
            return None;
        }
        let key = make_key(gate_id, tool, input);
        match self.entries.get(&key) {
            Some(entry) if now - entry.stored_at <= self.ttl_s => {
                self.hits += 1;
                Some(entry.result.clone())
            }
            Some(_) => {
                // Lazy eviction of the expired entry.
                self.entries.remove(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(
        &mut self,
        gate_id: &str,
        tool: &str,
        input: &Value,
        result: &GateResult,
        event: EventType,
        now: f64,
    ) {
        if !self.enabled || result.blocked || event != EventType::PreToolUse {
            return;
        }
        self.entries.insert(
            make_key(gate_id, tool, input),
            Entry {
                result: result.clone(),
                stored_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            enabled: self.enabled,
            ttl_s: self.ttl_s,
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            cached: self.entries.len(),
        }
    }

    #[cfg(test)]
    fn age_entry(&mut self, gate_id: &str, tool: &str, input: &Value, by_s: f64) {
        let key = make_key(gate_id, tool, input);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.stored_at -= by_s;
        }
    }
}
