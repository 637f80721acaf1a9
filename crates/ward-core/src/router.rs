use crate::error::Result;
use crate::fsio;
use crate::paths::WardPaths;
use crate::profiles;
use crate::registry::{self, GateSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use ward_types::Tier;

const REWARD_BLOCK: f64 = 1.0;
const REWARD_PASS: f64 = 0.1;

/// Orders the applicable gates for a tool.
///
/// Tier-1 gates always lead in registry order. The rest are sorted by
/// the historical usefulness of each (gate, tool) pair, a persisted
/// Q-value bumped on every block and decayed on every pass, so the
/// gates most likely to veto run before the ones that rarely fire.
/// Since an invocation is one short-lived process, loading once at
/// construction doubles as the per-invocation route cache.
#[derive(Debug)]
pub struct Router {
    path: PathBuf,
    qtable: BTreeMap<String, f64>,
    dirty: bool,
}

fn q_key(gate_id: &str, tool: &str) -> String {
    format!("{gate_id}|{tool}")
}

impl Router {
    pub fn load(paths: &WardPaths) -> Self {
        let path = paths.qtable_file();
        let qtable = match fsio::read_json_lenient(&path) {
            Some(Value::Object(obj)) => obj
                .into_iter()
                .filter_map(|(key, value)| value.as_f64().map(|q| (key, q)))
                .collect(),
            _ => BTreeMap::new(),
        };
        Router {
            path,
            qtable,
            dirty: false,
        }
    }

    pub fn q(&self, gate_id: &str, tool: &str) -> f64 {
        self.qtable.get(&q_key(gate_id, tool)).copied().unwrap_or(0.0)
    }

    /// The execution order for this tool under the given profile.
    pub fn order(&self, tool: &str, profile: &str) -> Vec<&'static GateSpec> {
        let mut tier1 = Vec::new();
        let mut rest = Vec::new();
        for spec in registry::applicable_to(tool) {
            if spec.tier == Tier::One {
                tier1.push(spec);
            } else if !profiles::is_disabled(profile, spec.id) {
                rest.push(spec);
            }
        }
        // Stable sort keeps registry order for equal Q-values.
        rest.sort_by(|a, b| {
            self.q(b.id, tool)
                .partial_cmp(&self.q(a.id, tool))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        tier1.extend(rest);
        tier1
    }

    pub fn record_block(&mut self, gate_id: &str, tool: &str) {
        *self.qtable.entry(q_key(gate_id, tool)).or_insert(0.0) += REWARD_BLOCK;
        self.dirty = true;
    }

    pub fn record_pass(&mut self, gate_id: &str, tool: &str) {
        *self.qtable.entry(q_key(gate_id, tool)).or_insert(0.0) -= REWARD_PASS;
        self.dirty = true;
    }

    /// Flush accumulated rewards at process end. Lost updates from
    /// concurrent invocations are acceptable telemetry loss.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let doc: Value = Value::Object(
            self.qtable
                .iter()
                .filter_map(|(key, q)| {
                    serde_json::Number::from_f64(*q).map(|n| (key.clone(), Value::Number(n)))
                })
                .collect(),
        );
        fsio::write_json_atomic(&self.path, &doc)?;
        self.dirty = false;
        Ok(())
    }
}
