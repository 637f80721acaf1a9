use crate::{Gate, GateContext, GateError};
use once_cell::sync::Lazy;
use regex::Regex;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_03_test_before_deploy";

static DEPLOYISH: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bgit\s+push\b",
        r"\bnpm\s+publish\b",
        r"\bcargo\s+publish\b",
        r"\bkubectl\s+apply\b",
        r"\bterraform\s+apply\b",
        r"\bdocker\s+push\b",
        r"\bgh\s+release\b",
        r"\bfly\s+deploy\b",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Tier 1: nothing ships while fixes are awaiting verification.
pub struct TestBeforeDeploy;

impl Gate for TestBeforeDeploy {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PostToolUse {
            return Ok(GateResult::pass(ID));
        }
        let command = ctx.input_str("command");
        if state.pending_verification.is_empty()
            || !DEPLOYISH.iter().any(|pattern| pattern.is_match(command))
        {
            return Ok(GateResult::pass(ID));
        }

        let message = format!(
            "{} unverified fix(es) pending ({}). Run the tests before deploying.",
            state.pending_verification.len(),
            state.pending_verification.join(", "),
        );
        state.record_block_outcome(ID, ctx.tool, "unverified fixes", ctx.now);
        Ok(GateResult::block(ID, message).with_severity(Severity::Error))
    }
}
