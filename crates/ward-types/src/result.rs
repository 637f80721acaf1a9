use crate::decision::{Decision, PermissionDecision};
use crate::{AuditDecision, Escalation, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What a gate's `check` hands back to the pipeline.
///
/// `escalation` is the tag of the allow/ask/warn/block union; when a gate
/// does not set it explicitly it is derived from `blocked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub blocked: bool,
    pub message: String,
    pub gate_name: String,
    pub severity: Severity,
    pub escalation: Escalation,
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl GateResult {
    pub fn new(blocked: bool, gate_name: impl Into<String>) -> Self {
        GateResult {
            blocked,
            message: String::new(),
            gate_name: gate_name.into(),
            severity: Severity::Info,
            escalation: Escalation::derived(blocked),
            duration_ms: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Silent pass.
    pub fn pass(gate_name: impl Into<String>) -> Self {
        Self::new(false, gate_name)
    }

    /// Hard block with a message shown to the user.
    pub fn block(gate_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(true, gate_name);
        result.message = message.into();
        result.severity = Severity::Error;
        result
    }

    /// Non-blocking warning; the message reaches the audit log only.
    pub fn warn(gate_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(false, gate_name);
        result.message = message.into();
        result.severity = Severity::Warn;
        result.escalation = Escalation::Warn;
        result
    }

    /// Ask escalation: the host prompts the user before running the tool.
    pub fn ask(gate_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(false, gate_name);
        result.message = message.into();
        result.severity = Severity::Warn;
        result.escalation = Escalation::Ask;
        result
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_ask(&self) -> bool {
        self.escalation == Escalation::Ask
    }

    pub fn is_warning(&self) -> bool {
        !self.blocked && !self.message.is_empty()
    }

    /// Collapse this result into the audit log's three-way outcome.
    pub fn audit_decision(&self) -> AuditDecision {
        if self.blocked {
            AuditDecision::Block
        } else if self.is_warning() {
            AuditDecision::Warn
        } else {
            AuditDecision::Pass
        }
    }

    /// Translate into the host's decision protocol.
    ///
    /// `None` means silent allow: no stdout, exit 0.
    pub fn to_hook_decision(&self) -> Option<Decision> {
        if self.blocked {
            Some(Decision::new(PermissionDecision::Deny, &self.message))
        } else if self.is_ask() {
            Some(Decision::new(PermissionDecision::Ask, &self.message))
        } else {
            None
        }
    }
}

impl fmt::Display for GateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.gate_name,
            if self.blocked { "BLOCK" } else { "pass" }
        )?;
        if self.severity != Severity::Info {
            write!(f, " severity={}", self.severity)?;
        }
        if self.escalation != Escalation::derived(self.blocked) {
            write!(f, " escalation={}", self.escalation)?;
        }
        Ok(())
    }
}
