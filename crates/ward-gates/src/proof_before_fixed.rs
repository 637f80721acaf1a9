use crate::{Gate, GateContext, GateError};
use once_cell::sync::Lazy;
use regex::Regex;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_05_proof_before_fixed";

static FIX_CLAIM: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"\bgit\s+commit\b[^|;&]*['"][^'"]*\b([Ff]ix|[Rr]esolve)"#).ok());

/// A commit that claims a fix needs a verified fix behind it. The claim
/// is proven by the tracker moving the entry from `pending_verification`
/// to `verified_fixes` after the tests actually ran.
pub struct ProofBeforeFixed;

impl Gate for ProofBeforeFixed {
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
        let claims_fix = FIX_CLAIM
            .as_ref()
            .map(|pattern| pattern.is_match(command))
            .unwrap_or(false);
        if !claims_fix || state.pending_verification.is_empty() {
            return Ok(GateResult::pass(ID));
        }

        let message = format!(
            "Commit message claims a fix, but {} change(s) are still unverified: {}.",
            state.pending_verification.len(),
            state.pending_verification.join(", "),
        );
        state.record_block_outcome(ID, ctx.tool, "unproven fix claim", ctx.now);
        Ok(GateResult::block(ID, message).with_severity(Severity::Error))
    }
}
