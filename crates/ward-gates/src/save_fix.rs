use crate::{Gate, GateContext, GateError};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult};

pub const ID: &str = "gate_06_save_fix";

/// Stop nagging after this many reminders per session.
const WARN_CAP: u64 = 3;

/// After the session has hit real errors, edits should end with the fix
/// being saved to memory. Advisory only; the reminder count rides along
/// in `gate6_warn_count`. (This gate also absorbed the old plan-mode
/// save reminder.)
pub struct SaveFix;

impl Gate for SaveFix {
    fn id(&self) -> &'static str {
        ID
    }

    fn runs_on_post(&self) -> bool {
        true
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PreToolUse {
            return Ok(GateResult::pass(ID));
        }
        if state.error_pattern_counts.is_empty() || state.gate6_warn_count >= WARN_CAP {
            return Ok(GateResult::pass(ID));
        }
        state.gate6_warn_count += 1;
        let message = format!(
            "This session hit {} distinct error pattern(s). Once the fix is verified, save it to memory.",
            state.error_pattern_counts.len(),
        );
        Ok(GateResult::warn(ID, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use serde_json::json;

    fn state_with_errors() -> SessionState {
        let mut state = SessionState::default();
        state
            .error_pattern_counts
            .insert("ImportError".to_string(), 2);
        state
    }

    #[test]
    fn post_edit_after_errors_warns_and_counts() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/x.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PostToolUse, 0.0);
        let mut state = state_with_errors();

        let result = SaveFix.check(&ctx, &mut state).unwrap();
        assert!(result.is_warning());
        assert!(!result.blocked);
        assert_eq!(state.gate6_warn_count, 1);
    }

    #[test]
    fn warning_stops_at_the_cap() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/x.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PostToolUse, 0.0);
        let mut state = state_with_errors();
        for _ in 0..5 {
            SaveFix.check(&ctx, &mut state).unwrap();
        }
        assert_eq!(state.gate6_warn_count, WARN_CAP);
    }

    #[test]
    fn clean_session_stays_silent() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/x.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PostToolUse, 0.0);
        let result = SaveFix.check(&ctx, &mut SessionState::default()).unwrap();
        assert!(!result.is_warning());
    }

    #[test]
    fn pre_event_is_silent() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/x.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 0.0);
        let mut state = state_with_errors();
        assert!(!SaveFix.check(&ctx, &mut state).unwrap().is_warning());
        assert_eq!(state.gate6_warn_count, 0);
    }
}
