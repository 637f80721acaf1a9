use serde_json::{Value, json};
use std::fmt;

/// The two non-silent verdicts the host protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Ask,
    Deny,
}

impl PermissionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionDecision::Ask => "ask",
            PermissionDecision::Deny => "deny",
        }
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-silent decision: the JSON document printed on stdout plus the
/// exit code the host expects. Silent allows never construct one.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    permission: PermissionDecision,
    reason: String,
}

impl Decision {
    pub fn new(permission: PermissionDecision, reason: impl Into<String>) -> Self {
        Decision {
            permission,
            reason: reason.into(),
        }
    }

    pub fn permission(&self) -> PermissionDecision {
        self.permission
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Exit code contract: ask is not a denial.
    pub fn exit_code(&self) -> i32 {
        match self.permission {
            PermissionDecision::Ask => 0,
            PermissionDecision::Deny => 2,
        }
    }

    /// The exact document the host parses. An empty reason omits the
    /// `reason` field entirely.
    pub fn to_json(&self) -> Value {
        let mut inner = json!({ "permissionDecision": self.permission.as_str() });
        if !self.reason.is_empty()
            && let Some(obj) = inner.as_object_mut()
        {
            obj.insert("reason".to_string(), Value::String(self.reason.clone()));
        }
        json!({ "hookSpecificOutput": inner })
    }
}
