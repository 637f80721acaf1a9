use crate::fsio;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use ward_types::Tier;

/// Circuit position for one gate (or one external service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Persisted per-gate record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub crash_timestamps: Vec<f64>,
    pub opened_at: Option<f64>,
    pub total_crashes: u64,
    pub total_skips: u64,
    pub successes_in_half_open: u64,
}

/// Thresholds for one breaker instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    pub crash_threshold: usize,
    pub crash_window_s: f64,
    pub cooldown_s: f64,
    pub successes_to_close: u64,
}

impl BreakerConfig {
    /// Gate breaker: 3 crashes in 300 s opens, 60 s cooldown.
    pub fn gates() -> Self {
        BreakerConfig {
            crash_threshold: 3,
            crash_window_s: 300.0,
            cooldown_s: 60.0,
            successes_to_close: 1,
        }
    }

    /// Memory-socket breaker: tighter window, 30 s cooldown.
    pub fn memory_socket() -> Self {
        BreakerConfig {
            crash_threshold: 3,
            crash_window_s: 30.0,
            cooldown_s: 30.0,
            successes_to_close: 1,
        }
    }
}

/// Per-gate fail-safe. Repeated crashes open the circuit so a broken
/// gate stops stalling every invocation; after the cooldown the next
/// call probes in HALF_OPEN.
///
/// The record file is read lazily and written on transitions only.
#[derive(Debug)]
pub struct CircuitBreaker {
    path: PathBuf,
    config: BreakerConfig,
    records: BTreeMap<String, CircuitRecord>,
    loaded: bool,
}

impl CircuitBreaker {
    pub fn new(path: PathBuf, config: BreakerConfig) -> Self {
        CircuitBreaker {
            path,
            config,
            records: BTreeMap::new(),
            loaded: false,
        }
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        if let Some(value) = fsio::read_json_lenient(&self.path)
            && let Ok(records) = serde_json::from_value(value)
        {
            self.records = records;
        }
        self.loaded = true;
    }

    fn persist(&self) {
        let doc = serde_json::to_value(&self.records).unwrap_or(Value::Null);
        if let Err(err) = fsio::write_json_atomic(&self.path, &doc) {
            eprintln!("ward: circuit state not persisted: {err}");
        }
    }

    /// True iff the circuit is OPEN right now. Tier-1 gates are never
    /// skipped. An OPEN circuit past its cooldown moves to HALF_OPEN and
    /// lets the call through as the probe.
    pub fn should_skip(&mut self, gate_id: &str, tier: Tier, now: f64) -> bool {
        if tier == Tier::One {
            return false;
        }
        self.ensure_loaded();
        let config = self.config;
        let Some(record) = self.records.get_mut(gate_id) else {
            return false;
        };
        match record.state {
            CircuitState::Closed | CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed = record.opened_at.map(|at| now - at).unwrap_or(f64::MAX);
                if elapsed >= config.cooldown_s {
                    record.state = CircuitState::HalfOpen;
                    record.successes_in_half_open = 0;
                    self.persist();
                    false
                } else {
                    record.total_skips += 1;
                    true
                }
            }
        }
    }

    /// Feed an outcome back. Failures count toward opening (except that
    /// Tier-1 circuits never leave CLOSED); a HALF_OPEN success closes,
    /// a HALF_OPEN failure re-opens.
    pub fn record_result(&mut self, gate_id: &str, tier: Tier, success: bool, now: f64) {
        self.ensure_loaded();
        let config = self.config;
        let record = self.records.entry(gate_id.to_string()).or_default();

        if success {
            if record.state == CircuitState::HalfOpen {
                record.successes_in_half_open += 1;
                if record.successes_in_half_open >= config.successes_to_close {
                    record.state = CircuitState::Closed;
                    record.opened_at = None;
                    record.crash_timestamps.clear();
                    self.persist();
                }
            }
            return;
        }

        record.total_crashes += 1;
        record.crash_timestamps.push(now);
        record
            .crash_timestamps
            .retain(|ts| now - *ts <= config.crash_window_s);

        if tier == Tier::One {
            return;
        }

        let reopen = record.state == CircuitState::HalfOpen;
        let trip = record.state == CircuitState::Closed
            && record.crash_timestamps.len() >= config.crash_threshold;
        if reopen || trip {
            record.state = CircuitState::Open;
            record.opened_at = Some(now);
            record.successes_in_half_open = 0;
            self.persist();
        }
    }

    pub fn state_of(&mut self, gate_id: &str) -> CircuitState {
        self.ensure_loaded();
        self.records
            .get(gate_id)
            .map(|record| record.state)
            .unwrap_or_default()
    }

    pub fn snapshot(&mut self) -> &BTreeMap<String, CircuitRecord> {
        self.ensure_loaded();
        &self.records
    }
}
