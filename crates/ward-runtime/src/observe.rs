use crate::secrets::scrub;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Error families worth counting. First match wins; the specific ones
/// outrank the generic trailing "Error".
const ERROR_MARKERS: &[&str] = &[
    "Traceback",
    "ImportError",
    "ModuleNotFoundError",
    "SyntaxError",
    "TypeError",
    "AttributeError",
    "panicked at",
    "error[E",
    "FAILED",
    "Error",
];

/// Normalize raw tool output to an error family, if it is one.
pub fn normalize_error(text: &str) -> Option<&'static str> {
    ERROR_MARKERS
        .iter()
        .find(|marker| text.contains(**marker))
        .copied()
}

/// Compact record of one tool call, headed for the capture queue and
/// from there into the memory worker's observations table.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub document: String,
    pub metadata: Map<String, Value>,
}

fn response_text(response: Option<&Value>) -> String {
    match response {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(obj)) => {
            let stdout = obj.get("stdout").and_then(Value::as_str).unwrap_or("");
            let stderr = obj.get("stderr").and_then(Value::as_str).unwrap_or("");
            format!("{stdout}\n{stderr}")
        }
        Some(other) => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn hash16(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Turn `(tool, input, response)` into a small document plus metadata.
/// Secrets are scrubbed from the document before it leaves the process.
pub fn compress_observation(
    tool: &str,
    input: &Value,
    response: Option<&Value>,
    session_id: &str,
    wall: DateTime<Utc>,
) -> Observation {
    let text = response_text(response);
    let error_pattern = normalize_error(&text);
    let exit_code = response
        .and_then(|value| value.get("exit_code"))
        .and_then(Value::as_i64);
    let has_error = error_pattern.is_some() || exit_code.is_some_and(|code| code != 0);

    let str_field = |name: &str| input.get(name).and_then(Value::as_str).unwrap_or("");

    let document = match tool {
        "Bash" => {
            let command = str_field("command");
            let code = exit_code.unwrap_or(if has_error { 1 } else { 0 });
            format!(
                "Bash: {} → EXIT {} | {}",
                truncate(command, 120),
                code,
                truncate(text.trim(), 120),
            )
        }
        "Edit" | "NotebookEdit" => format!("{}: {}", tool, str_field("file_path")),
        "Write" => format!(
            "Write: {} ({} chars)",
            str_field("file_path"),
            str_field("content").chars().count(),
        ),
        "Read" => format!("Read: {}", str_field("file_path")),
        "Grep" => format!("Grep: {} in {}", str_field("pattern"), str_field("path")),
        "UserPrompt" => format!("UserPrompt: {}", truncate(str_field("prompt"), 200)),
        _ => format!("{}: {}", tool, truncate(&input.to_string(), 160)),
    };

    let mut metadata = Map::new();
    metadata.insert("tool_name".to_string(), json!(tool));
    metadata.insert("session_id".to_string(), json!(session_id));
    metadata.insert("timestamp".to_string(), json!(wall.to_rfc3339()));
    metadata.insert(
        "has_error".to_string(),
        json!(if has_error { "true" } else { "false" }),
    );
    metadata.insert(
        "error_pattern".to_string(),
        json!(error_pattern.unwrap_or("")),
    );
    if let Some(code) = exit_code {
        metadata.insert("exit_code".to_string(), json!(code.to_string()));
    }
    if tool == "Bash" {
        metadata.insert(
            "command_hash".to_string(),
            json!(hash16(str_field("command"))),
        );
    }

    Observation {
        document: scrub(&document),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn bash_success_format() {
        let obs = compress_observation(
            "Bash",
            &json!({"command": "echo hello"}),
            Some(&json!({"stdout": "hello", "exit_code": 0})),
            "test-sess",
            now(),
        );
        assert!(obs.document.starts_with("Bash:"), "{}", obs.document);
        assert!(obs.document.contains("EXIT 0"));
        assert_eq!(obs.metadata["has_error"], "false");
        assert_eq!(obs.metadata["command_hash"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn bash_error_detects_pattern() {
        let obs = compress_observation(
            "Bash",
            &json!({"command": "python fail.py"}),
            Some(&json!("Traceback (most recent call last):\nError")),
            "test-sess",
            now(),
        );
        assert_eq!(obs.metadata["has_error"], "true");
        assert_eq!(obs.metadata["error_pattern"], "Traceback");
    }

    #[test]
    fn edit_write_and_prompt_formats() {
        let obs = compress_observation(
            "Edit",
            &json!({"file_path": "/tmp/test.py", "old_string": "a\nb\nc"}),
            None,
            "test-sess",
            now(),
        );
        assert!(obs.document.contains("Edit: /tmp/test.py"));

        let obs = compress_observation(
            "Write",
            &json!({"file_path": "/tmp/new.py", "content": "x".repeat(100)}),
            None,
            "test-sess",
            now(),
        );
        assert!(obs.document.contains("Write: /tmp/new.py (100 chars)"));

        let obs = compress_observation(
            "UserPrompt",
            &json!({"prompt": "fix the bug"}),
            None,
            "test-sess",
            now(),
        );
        assert!(obs.document.contains("UserPrompt: fix the bug"));
    }

    #[test]
    fn nonzero_exit_is_an_error_even_without_pattern() {
        let obs = compress_observation(
            "Bash",
            &json!({"command": "false"}),
            Some(&json!({"stdout": "", "exit_code": 1})),
            "s",
            now(),
        );
        assert_eq!(obs.metadata["has_error"], "true");
        assert_eq!(obs.metadata["error_pattern"], "");
    }

    #[test]
    fn documents_are_scrubbed() {
        let obs = compress_observation(
            "Bash",
            &json!({"command": "export API_TOKEN=supersecret123"}),
            None,
            "s",
            now(),
        );
        assert!(!obs.document.contains("supersecret123"), "{}", obs.document);
        assert!(obs.document.contains("<REDACTED>"));
    }

    #[test]
    fn error_normalizer_prefers_specific_markers() {
        assert_eq!(normalize_error("ImportError: no module"), Some("ImportError"));
        assert_eq!(
            normalize_error("Traceback (most recent call last):"),
            Some("Traceback")
        );
        assert_eq!(normalize_error("thread panicked at 'oops'"), Some("panicked at"));
        assert_eq!(normalize_error("all good"), None);
    }
}
