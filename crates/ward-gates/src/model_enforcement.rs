use crate::{Gate, GateContext, GateError};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult};

pub const ID: &str = "gate_10_model_enforcement";

/// Stop repeating the same advisory once a pairing is clearly deliberate.
const SUPPRESS_AFTER: u64 = 3;

/// Recommended model band per sub-agent role.
fn recommended_for(agent: &str) -> Option<(&'static [&'static str], &'static str)> {
    match agent {
        "Explore" | "Research" => Some((&["haiku", "sonnet"], "haiku or sonnet")),
        "general-purpose" | "builder" => Some((&["sonnet", "opus"], "sonnet or opus")),
        "Plan" => Some((&["sonnet"], "sonnet")),
        _ => None,
    }
}

/// Sub-agent spawns must name a model, and the model should fit the
/// role: exploration on the small models, building on the large ones.
/// Mismatches are advisory; a missing model is not.
pub struct ModelEnforcement;

impl Gate for ModelEnforcement {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PostToolUse || ctx.tool != "Task" {
            return Ok(GateResult::pass(ID));
        }

        let agent = ctx.input_str("subagent_type");
        let model = ctx.input_str("model");

        if model.is_empty() {
            let message = "Task spawned without a model. Pick one deliberately: \
                           haiku for quick lookups (e.g. 'Search for files'), sonnet for \
                           most work, opus only where depth pays for itself."
                .to_string();
            state.record_block_outcome(ID, ctx.tool, "missing model", ctx.now);
            return Ok(GateResult::block(ID, message));
        }

        let combo = format!("{agent}:{model}");
        let uses = {
            let counter = state.model_agent_usage.entry(combo).or_insert(0);
            *counter += 1;
            *counter
        };

        if let Some((allowed, recommendation)) = recommended_for(agent)
            && !allowed.iter().any(|candidate| model.contains(candidate))
            && uses < SUPPRESS_AFTER
        {
            return Ok(GateResult::warn(
                ID,
                format!("{agent} agents usually run on {recommendation}; got '{model}'."),
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

    fn run(input: serde_json::Value, state: &mut SessionState) -> GateResult {
        let fixture = Fixture::new();
        let ctx = fixture.ctx("Task", &input, EventType::PreToolUse, 0.0);
        ModelEnforcement.check(&ctx, state).unwrap()
    }

    #[test]
    fn task_without_model_blocks_with_guidance() {
        let result = run(
            json!({"subagent_type": "Explore", "description": "scan"}),
            &mut SessionState::default(),
        );
        assert!(result.blocked);
        let lower = result.message.to_lowercase();
        assert!(lower.contains("haiku") && lower.contains("sonnet"));
        assert!(result.message.contains("Search for files"));
    }

    #[test]
    fn task_with_model_passes_and_counts_usage() {
        let mut state = SessionState::default();
        let result = run(
            json!({"subagent_type": "builder", "model": "sonnet"}),
            &mut state,
        );
        assert!(!result.blocked);
        assert!(result.message.is_empty());
        assert_eq!(state.model_agent_usage.get("builder:sonnet"), Some(&1));
    }

    #[test]
    fn explore_on_opus_warns_but_never_blocks() {
        let result = run(
            json!({"subagent_type": "Explore", "model": "opus"}),
            &mut SessionState::default(),
        );
        assert!(!result.blocked);
        assert!(result.message.contains("haiku or sonnet"));
    }

    #[test]
    fn general_purpose_on_haiku_warns() {
        let result = run(
            json!({"subagent_type": "general-purpose", "model": "haiku"}),
            &mut SessionState::default(),
        );
        assert!(!result.blocked);
        assert!(result.message.contains("sonnet or opus"));
    }

    #[test]
    fn unknown_agent_passes_silently() {
        let result = run(
            json!({"subagent_type": "custom-lint-bot", "model": "opus"}),
            &mut SessionState::default(),
        );
        assert!(!result.blocked);
        assert!(result.message.is_empty());
    }

    #[test]
    fn repeated_pairing_suppresses_the_warning() {
        let mut state = SessionState::default();
        state
            .model_agent_usage
            .insert("Explore:opus".to_string(), 2);
        let result = run(
            json!({"subagent_type": "Explore", "model": "opus"}),
            &mut state,
        );
        assert!(result.message.is_empty());
        assert_eq!(state.model_agent_usage.get("Explore:opus"), Some(&3));
    }

    #[test]
    fn non_task_tools_pass() {
        let fixture = Fixture::new();
        let input = json!({"command": "ls"});
        let ctx = fixture.ctx("Bash", &input, EventType::PreToolUse, 0.0);
        let result = ModelEnforcement
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(!result.blocked);
        assert!(result.message.is_empty());
    }
}
