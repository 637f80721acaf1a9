use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ward_core::fsio;
use ward_core::paths::WardPaths;
use ward_types::{AuditDecision, GateResult};

/// Crockford base32, in ascending ASCII order so lexicographic compare
/// equals numeric compare.
const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// A 26-character time-ordered unique id: 48 bits of millisecond Unix
/// time followed by 80 bits of cryptographic randomness. Two ids from
/// the same millisecond still sort deterministically by their random
/// tail (ties accepted).
pub fn ulid_new(wall: DateTime<Utc>) -> String {
    let millis = wall.timestamp_millis().max(0) as u128;
    let tail: u128 = rand::random::<u128>() & ((1u128 << 80) - 1);
    let mut value = (millis << 80) | tail;

    let mut out = [0u8; 26];
    for slot in out.iter_mut().rev() {
        *slot = CROCKFORD[(value & 0x1f) as usize];
        value >>= 5;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// One immutable decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: String,
    pub gate: String,
    pub tool: String,
    pub decision: AuditDecision,
    pub reason: String,
    pub session_id: String,
    pub severity: ward_types::Severity,
}

/// Appends decision records to the daily file and a capped rolling
/// trail. Append-only; nothing here is ever rewritten.
#[derive(Debug, Clone)]
pub struct AuditLog {
    paths: WardPaths,
    trail_cap: usize,
}

impl AuditLog {
    pub fn new(paths: WardPaths, trail_cap: usize) -> Self {
        AuditLog { paths, trail_cap }
    }

    pub fn append(
        &self,
        gate: &str,
        tool: &str,
        result: &GateResult,
        session_id: &str,
        wall: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let entry = AuditEntry {
            id: ulid_new(wall),
            timestamp: wall.to_rfc3339(),
            gate: gate.to_string(),
            tool: tool.to_string(),
            decision: result.audit_decision(),
            reason: result.message.clone(),
            session_id: session_id.to_string(),
            severity: result.severity,
        };
        let line = serde_json::to_value(&entry)?;

        let daily = self
            .paths
            .audit_dir()
            .join(format!("{}.jsonl", wall.format("%Y-%m-%d")));
        fsio::append_jsonl(&daily, &line)?;

        let trail = self.paths.audit_dir().join("trail.jsonl");
        fsio::append_jsonl_capped(&trail, &line, self.trail_cap)?;
        Ok(entry)
    }
}
