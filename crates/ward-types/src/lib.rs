mod decision;
mod event;
mod result;

pub use decision::{Decision, PermissionDecision};
pub use event::{HookPayload, PayloadError};
pub use result::GateResult;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hook event the host is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    PreToolUse,
    PostToolUse,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PreToolUse => "PreToolUse",
            EventType::PostToolUse => "PostToolUse",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a gate result. Not transmitted to the host;
/// written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a gate wants its result handled by the host.
///
/// Unknown escalation strings collapse to `Block` at construction so
/// downstream code never has to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    Block,
    Ask,
    Warn,
    Allow,
}

impl Escalation {
    /// Parse a raw escalation label. Anything unrecognized is a block.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "block" => Escalation::Block,
            "ask" => Escalation::Ask,
            "warn" => Escalation::Warn,
            "allow" => Escalation::Allow,
            _ => Escalation::Block,
        }
    }

    /// Default escalation derived from the blocked flag.
    pub fn derived(blocked: bool) -> Self {
        if blocked {
            Escalation::Block
        } else {
            Escalation::Allow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Escalation::Block => "block",
            Escalation::Ask => "ask",
            Escalation::Warn => "warn",
            Escalation::Allow => "allow",
        }
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class of a gate. Tier 1 gates always run and are never
/// skipped, cached across ticks, or downgraded by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    pub fn as_u8(&self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Three-way outcome recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Pass,
    Warn,
    Block,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDecision::Pass => "pass",
            AuditDecision::Warn => "warn",
            AuditDecision::Block => "block",
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
