use crate::{Gate, GateContext, GateError};
use once_cell::sync::Lazy;
use regex::Regex;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult};

pub const ID: &str = "gate_07_critical_file_guard";

static CRITICAL_PATH: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(^|/)Cargo\.lock$", "dependency lockfile"),
        (r"(^|/)package-lock\.json$", "dependency lockfile"),
        (r"(^|/)yarn\.lock$", "dependency lockfile"),
        (r"(^|/)\.github/workflows/", "CI workflow"),
        (r"(^|/)\.env(\.|$)", "environment secrets"),
        (r"(^|/)migrations?/", "database migration"),
        (r"(^|/)\.git/config$", "git configuration"),
        (r"(^|/)Dockerfile$", "container build definition"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Graduated escalation for files where a bad edit is expensive to walk
/// back: the tool is not denied, the host prompts the user first.
pub struct CriticalFileGuard;

fn critical_label(path: &str) -> Option<&'static str> {
    CRITICAL_PATH
        .iter()
        .find(|(pattern, _)| pattern.is_match(path))
        .map(|(_, label)| *label)
}

impl Gate for CriticalFileGuard {
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
        let target = if ctx.tool == "Bash" {
            ctx.input_str("command")
        } else {
            ctx.input_str("file_path")
        };
        let hit = if ctx.tool == "Bash" {
            target
                .split_whitespace()
                .find_map(critical_label)
        } else {
            critical_label(target)
        };
        match hit {
            Some(label) => Ok(GateResult::ask(
                ID,
                format!("This touches a {label} ({target}). Proceed?"),
            )),
            None => Ok(GateResult::pass(ID)),
        }
    }
}
