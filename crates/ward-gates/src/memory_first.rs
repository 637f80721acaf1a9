use crate::{Gate, GateContext, GateError};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_04_memory_first";

/// How stale a memory query may be before mutations are gated.
const FRESHNESS_WINDOW_S: f64 = 60.0;

/// Mutating work should start from what the memory store already knows.
/// The freshness signal is `memory_last_queried`, stamped by the tracker
/// whenever a memory query goes through.
pub struct MemoryFirst;

impl Gate for MemoryFirst {
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
        let age = ctx.now - state.memory_last_queried;
        if state.memory_last_queried > 0.0 && age <= FRESHNESS_WINDOW_S {
            return Ok(GateResult::pass(ID));
        }

        let message = if state.memory_last_queried <= 0.0 {
            "Memory has not been queried this session. Search memory before making changes."
                .to_string()
        } else {
            format!(
                "Last memory query was {age:.0}s ago. Re-check memory before making more changes."
            )
        };
        state.record_block_outcome(ID, ctx.tool, "stale memory", ctx.now);
        Ok(GateResult::block(ID, message).with_severity(Severity::Warn))
    }
}
