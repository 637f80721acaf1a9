use crate::{Gate, GateContext, GateError};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult};

pub const ID: &str = "gate_14_confidence_check";

/// Repeated errors before the nudge fires.
const ERROR_BUDGET: u64 = 3;

/// Tier 3 advisory: when the same errors keep coming back, suggest
/// stepping back instead of editing harder. Disabled entirely by the
/// permissive and refactor profiles.
pub struct ConfidenceCheck;

impl Gate for ConfidenceCheck {
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
        let repeats: u64 = state
            .error_pattern_counts
            .values()
            .filter(|count| **count >= 2)
            .sum();
        if repeats < ERROR_BUDGET {
            return Ok(GateResult::pass(ID));
        }
        let worst = state
            .error_pattern_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(pattern, _)| pattern.as_str())
            .unwrap_or("an error");
        Ok(GateResult::warn(
            ID,
            format!(
                "The same errors keep recurring (mostly {worst}). Consider re-reading the \
                 failing code or querying memory before the next edit."
            ),
        ))
    }
}
