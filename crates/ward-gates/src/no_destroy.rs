use crate::{Gate, GateContext, GateError};
use once_cell::sync::Lazy;
use regex::Regex;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_02_no_destroy";

static DESTRUCTIVE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"\brm\s+(-[a-zA-Z]+\s+)*-[a-zA-Z]*[rRf][a-zA-Z]*\s+(/|~|\$HOME)(\s|$|\*)",
            "forced delete of a root or home path",
        ),
        (r":\s*\(\s*\)\s*\{.*\|.*&.*\}", "fork bomb"),
        (r"\bmkfs(\.\w+)?\b", "filesystem format"),
        (
            r"\bdd\b.*\bof=/dev/(sd|hd|nvme|vd)",
            "raw write to a block device",
        ),
        (r">\s*/dev/(sd|hd|nvme|vd)", "raw write to a block device"),
        (r"\bchmod\s+(-R\s+)?777\s+/(\s|$)", "world-writable root"),
        (
            r"\bgit\s+checkout\s+--\s+\.(\s|$)",
            "wholesale discard of working tree changes",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Tier 1: destructive shell commands never run, whatever the profile.
///
/// Wrapping in `bash -c`, `sh -c`, `sudo`, or `env` does not launder a
/// command, since patterns match anywhere in the line.
pub struct NoDestroy;

impl Gate for NoDestroy {
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
        let command = ctx.input_str("command");
        for (pattern, label) in DESTRUCTIVE.iter() {
            if pattern.is_match(command) {
                let message = format!("Destructive command refused: {label}.");
                return Ok(GateResult::block(ID, message).with_severity(Severity::Critical));
            }
        }
        Ok(GateResult::pass(ID))
    }
}
