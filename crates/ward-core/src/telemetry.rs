use crate::error::Result;
use crate::fsio;
use crate::paths::WardPaths;
use crate::state::TimingStat;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

const BUS_CAPACITY: usize = 256;

/// In-process counters, gauges, and histograms.
///
/// Everything here dies with the invocation; anything worth keeping is
/// folded into the timing file or the audit log before exit.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    histograms: BTreeMap<String, Vec<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn incr(&mut self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&mut self, name: &str, by: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn gauge(&mut self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    pub fn observe(&mut self, name: &str, value: f64) {
        self.histograms.entry(name.to_string()).or_default().push(value);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> Value {
        let histograms: BTreeMap<String, Value> = self
            .histograms
            .iter()
            .map(|(name, samples)| {
                let count = samples.len();
                let sum: f64 = samples.iter().sum();
                let max = samples.iter().cloned().fold(f64::MIN, f64::max);
                (
                    name.clone(),
                    json!({
                        "count": count,
                        "sum": sum,
                        "mean": if count == 0 { 0.0 } else { sum / count as f64 },
                        "max": if count == 0 { 0.0 } else { max },
                    }),
                )
            })
            .collect();
        json!({
            "counters": self.counters,
            "gauges": self.gauges,
            "histograms": histograms,
        })
    }
}

/// One event on the in-process bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub ts: f64,
    pub kind: String,
    pub fields: Value,
}

/// Bounded ring buffer of pipeline events (gate crashes, skips, cache
/// activity). Oldest entries fall off the back.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    events: VecDeque<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        EventBus {
            capacity,
            events: VecDeque::new(),
        }
    }

    pub fn emit(&mut self, ts: f64, kind: &str, fields: Value) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(BusEvent {
            ts,
            kind: kind.to_string(),
            fields,
        });
    }

    pub fn recent(&self, n: usize) -> impl Iterator<Item = &BusEvent> {
        let start = self.events.len().saturating_sub(n);
        self.events.iter().skip(start)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Cross-session per-gate latency aggregates, persisted with the same
/// read-modify-write + rename discipline as the other telemetry files.
#[derive(Debug)]
pub struct GateTimings {
    path: PathBuf,
    stats: BTreeMap<String, TimingStat>,
    dirty: bool,
}

impl GateTimings {
    pub fn load(paths: &WardPaths) -> Self {
        let path = paths.timings_file();
        let stats = fsio::read_json_lenient(&path)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        GateTimings {
            path,
            stats,
            dirty: false,
        }
    }

    pub fn record(&mut self, gate_id: &str, ms: f64) {
        self.stats.entry(gate_id.to_string()).or_default().record(ms);
        self.dirty = true;
    }

    /// A gate is degraded when its mean runtime exceeds the soft
    /// deadline. Degradation informs operators; it never makes a gate
    /// skippable; that is the circuit breaker's job, and Tier-1 gates
    /// are exempt even there.
    pub fn degraded(&self, gate_id: &str, deadline_ms: f64) -> bool {
        self.stats
            .get(gate_id)
            .map(|stat| stat.count >= 5 && stat.mean_ms() > deadline_ms)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> &BTreeMap<String, TimingStat> {
        &self.stats
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let doc = serde_json::to_value(&self.stats)?;
        fsio::write_json_atomic(&self.path, &doc)?;
        self.dirty = false;
        Ok(())
    }
}
