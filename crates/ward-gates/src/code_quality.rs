use crate::{Gate, GateContext, GateError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult};

pub const ID: &str = "gate_16_code_quality";

static SMELLS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?m)^<<<<<<< ", "merge conflict marker"),
        (r"\bdebugger;", "leftover debugger statement"),
        (r"\bimport\s+pdb\b|\bpdb\.set_trace\(\)", "leftover pdb breakpoint"),
        (r"\bbreakpoint\(\)", "leftover breakpoint()"),
        (r"console\.log\(", "stray console.log"),
        (r"(?i)\bdo not commit\b", "'do not commit' marker"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Tier 3 advisory lint over the text about to be written. Flags only
/// the handful of things that are wrong in any codebase.
pub struct CodeQuality;

impl Gate for CodeQuality {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        _state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PostToolUse {
            return Ok(GateResult::pass(ID));
        }
        let text = ["new_string", "content"]
            .iter()
            .find_map(|field| ctx.input.get(*field).and_then(Value::as_str))
            .unwrap_or("");
        if text.is_empty() {
            return Ok(GateResult::pass(ID));
        }
        let found: Vec<&str> = SMELLS
            .iter()
            .filter(|(pattern, _)| pattern.is_match(text))
            .map(|(_, label)| *label)
            .collect();
        if found.is_empty() {
            return Ok(GateResult::pass(ID));
        }
        Ok(GateResult::warn(
            ID,
            format!("About to write: {}.", found.join(", ")),
        ))
    }
}
