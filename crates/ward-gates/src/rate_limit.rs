use crate::{Gate, GateContext, GateError};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_11_rate_limit";

const BLOCK_PER_MINUTE: usize = 60;
const WARN_PER_MINUTE: usize = 40;

/// Session-wide velocity brake, deliberately last in the registry so
/// every cheaper gate gets its veto in before a call is charged to the
/// window. A runaway loop of tool calls is the one failure mode that
/// gets worse the longer it goes unnoticed.
pub struct RateLimit;

impl Gate for RateLimit {
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
        state.rate_window_timestamps.push(ctx.now);
        state
            .rate_window_timestamps
            .retain(|ts| ctx.now - *ts <= ward_core::RATE_WINDOW_S);

        let last_minute = state
            .rate_window_timestamps
            .iter()
            .filter(|ts| ctx.now - **ts <= 60.0)
            .count();

        if last_minute > BLOCK_PER_MINUTE {
            let message = format!(
                "{last_minute} calls/min exceeds the {BLOCK_PER_MINUTE} calls/min ceiling. \
                 Slow down and batch the work."
            );
            state.record_block_outcome(ID, ctx.tool, "rate ceiling", ctx.now);
            return Ok(GateResult::block(ID, message).with_severity(Severity::Error));
        }
        if last_minute > WARN_PER_MINUTE {
            return Ok(GateResult::warn(
                ID,
                format!("{last_minute} calls/min and climbing; ceiling is {BLOCK_PER_MINUTE}."),
            ));
        }
        Ok(GateResult::pass(ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use serde_json::json;

    fn state_with_calls(count: usize, now: f64) -> SessionState {
        let mut state = SessionState::default();
        state.rate_window_timestamps = (0..count).map(|i| now - (i as f64 * 0.5)).collect();
        state
    }

    #[test]
    fn low_rate_passes() {
        let fixture = Fixture::new();
        let input = json!({});
        let ctx = fixture.ctx("Bash", &input, EventType::PreToolUse, 1000.0);
        let mut state = state_with_calls(5, 1000.0);
        assert!(!RateLimit.check(&ctx, &mut state).unwrap().blocked);
    }

    #[test]
    fn elevated_rate_warns_without_blocking() {
        let fixture = Fixture::new();
        let input = json!({});
        let ctx = fixture.ctx("Bash", &input, EventType::PreToolUse, 1000.0);
        let mut state = state_with_calls(50, 1000.0);
        let result = RateLimit.check(&ctx, &mut state).unwrap();
        assert!(!result.blocked);
        assert!(result.is_warning());
    }

    #[test]
    fn runaway_rate_blocks_with_calls_per_minute() {
        let fixture = Fixture::new();
        let input = json!({});
        let ctx = fixture.ctx("Bash", &input, EventType::PreToolUse, 1000.0);
        let mut state = state_with_calls(70, 1000.0);
        let result = RateLimit.check(&ctx, &mut state).unwrap();
        assert!(result.blocked);
        assert!(result.message.contains("calls/min"));
    }

    #[test]
    fn old_timestamps_age_out() {
        let fixture = Fixture::new();
        let input = json!({});
        let ctx = fixture.ctx("Bash", &input, EventType::PreToolUse, 1000.0);
        let mut state = SessionState::default();
        state.rate_window_timestamps = (0..70).map(|i| 700.0 + i as f64 * 0.1).collect();
        let result = RateLimit.check(&ctx, &mut state).unwrap();
        assert!(!result.blocked);
        // Everything older than the 120 s window was pruned on the way.
        assert_eq!(state.rate_window_timestamps.len(), 1);
    }

    #[test]
    fn post_event_never_blocks() {
        let fixture = Fixture::new();
        let input = json!({});
        let ctx = fixture.ctx("Bash", &input, EventType::PostToolUse, 1000.0);
        let mut state = state_with_calls(999, 1000.0);
        assert!(!RateLimit.check(&ctx, &mut state).unwrap().blocked);
    }
}
