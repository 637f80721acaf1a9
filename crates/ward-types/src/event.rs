use crate::EventType;
use serde_json::Value;
use std::fmt;

/// Error raised when the host payload cannot be interpreted.
///
/// The caller treats this as fail-open: allow, exit 0, log to stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError(pub String);

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hook payload: {}", self.0)
    }
}

impl std::error::Error for PayloadError {}

/// The JSON document the host hands us on stdin, one per tool call.
/// `tool_response` is only present on `PostToolUse`.
#[derive(Debug, Clone, PartialEq)]
pub struct HookPayload {
    pub event_type: EventType,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_response: Option<Value>,
    pub session_id: String,
}

impl HookPayload {
    /// Interpret a parsed stdin document.
    ///
    /// `tool_input` and `session_id` get defaults when absent; a missing
    /// or unrecognized `event_type` or `tool_name` is a payload error.
    pub fn from_json(value: &Value) -> Result<Self, PayloadError> {
        let obj = value
            .as_object()
            .ok_or_else(|| PayloadError("payload is not a JSON object".to_string()))?;

        let event_type = match obj.get("event_type").and_then(Value::as_str) {
            Some("PreToolUse") => EventType::PreToolUse,
            Some("PostToolUse") => EventType::PostToolUse,
            Some(other) => {
                return Err(PayloadError(format!("unknown event_type '{other}'")));
            }
            None => return Err(PayloadError("missing event_type".to_string())),
        };

        let tool_name = obj
            .get("tool_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PayloadError("missing tool_name".to_string()))?;

        let tool_input = obj
            .get("tool_input")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        let tool_response = obj.get("tool_response").cloned();

        let session_id = obj
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("default")
            .to_string();

        Ok(HookPayload {
            event_type,
            tool_name,
            tool_input,
            tool_response,
            session_id,
        })
    }

    /// Parse a raw stdin string.
    pub fn from_str(raw: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PayloadError(format!("not JSON: {e}")))?;
        Self::from_json(&value)
    }
}
