mod canary;
mod code_quality;
mod confidence_check;
mod critical_file_guard;
mod injection_defense;
mod memory_first;
mod model_enforcement;
mod no_destroy;
mod proof_before_fixed;
mod rate_limit;
mod read_before_edit;
mod save_fix;
mod test_before_deploy;
mod workspace_isolation;

use serde_json::Value;
use std::fmt;
use ward_core::paths::WardPaths;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Tier};

/// A gate's unhandled failure. The runtime treats this exactly like an
/// exception: record against the circuit breaker and fail open.
#[derive(Debug)]
pub struct GateError(pub String);

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate failure: {}", self.0)
    }
}

impl std::error::Error for GateError {}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError(err.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError(err.to_string())
    }
}

impl From<ward_core::Error> for GateError {
    fn from(err: ward_core::Error) -> Self {
        GateError(err.to_string())
    }
}

/// Everything a gate may look at besides session state.
pub struct GateContext<'a> {
    pub tool: &'a str,
    pub input: &'a Value,
    pub event: EventType,
    pub session_id: &'a str,
    pub now: f64,
    pub paths: &'a WardPaths,
}

impl GateContext<'_> {
    pub fn input_str(&self, field: &str) -> &str {
        self.input.get(field).and_then(Value::as_str).unwrap_or("")
    }
}

/// The one contract every gate implements. Gates hold no state of their
/// own; everything they remember goes through `SessionState` (and from
/// there into the sideband).
pub trait Gate {
    fn id(&self) -> &'static str;

    fn tier(&self) -> Tier {
        ward_core::tier_of(self.id())
    }

    /// Whether this gate wants to see PostToolUse events too.
    fn runs_on_post(&self) -> bool {
        false
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError>;
}

/// Construct a gate by registry id. `None` for unknown ids; the
/// registry validation at startup turns that into `RegistryMismatch`
/// before any tool call is evaluated.
pub fn build(gate_id: &str) -> Option<Box<dyn Gate>> {
    match gate_id {
        read_before_edit::ID => Some(Box::new(read_before_edit::ReadBeforeEdit)),
        no_destroy::ID => Some(Box::new(no_destroy::NoDestroy)),
        test_before_deploy::ID => Some(Box::new(test_before_deploy::TestBeforeDeploy)),
        memory_first::ID => Some(Box::new(memory_first::MemoryFirst)),
        proof_before_fixed::ID => Some(Box::new(proof_before_fixed::ProofBeforeFixed)),
        save_fix::ID => Some(Box::new(save_fix::SaveFix)),
        critical_file_guard::ID => Some(Box::new(critical_file_guard::CriticalFileGuard)),
        model_enforcement::ID => Some(Box::new(model_enforcement::ModelEnforcement)),
        rate_limit::ID => Some(Box::new(rate_limit::RateLimit)),
        workspace_isolation::ID => Some(Box::new(workspace_isolation::WorkspaceIsolation)),
        confidence_check::ID => Some(Box::new(confidence_check::ConfidenceCheck)),
        code_quality::ID => Some(Box::new(code_quality::CodeQuality)),
        injection_defense::ID => Some(Box::new(injection_defense::InjectionDefense)),
        canary::ID => Some(Box::new(canary::Canary)),
        _ => None,
    }
}

/// Every id `build` can construct, for registry validation.
pub fn all_gate_ids() -> Vec<&'static str> {
    vec![
        read_before_edit::ID,
        no_destroy::ID,
        test_before_deploy::ID,
        memory_first::ID,
        proof_before_fixed::ID,
        save_fix::ID,
        critical_file_guard::ID,
        model_enforcement::ID,
        rate_limit::ID,
        workspace_isolation::ID,
        confidence_check::ID,
        code_quality::ID,
        injection_defense::ID,
        canary::ID,
    ]
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub struct Fixture {
        pub dir: tempfile::TempDir,
        pub paths: WardPaths,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let paths = WardPaths::new(dir.path());
            Fixture { dir, paths }
        }

        pub fn ctx<'a>(
            &'a self,
            tool: &'a str,
            input: &'a Value,
            event: EventType,
            now: f64,
        ) -> GateContext<'a> {
            GateContext {
                tool,
                input,
                event,
                session_id: "test-session",
                now,
                paths: &self.paths,
            }
        }
    }
}
