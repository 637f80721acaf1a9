use ward_types::GateResult;

/// What the process hands back to the host: an optional stdout document
/// and an exit code. Allow is silent: no output, exit 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub stdout: Option<String>,
    pub exit_code: i32,
}

impl Emission {
    pub fn allow() -> Self {
        Emission {
            stdout: None,
            exit_code: 0,
        }
    }

    /// Translate a gate result into the host decision protocol.
    pub fn from_result(result: &GateResult) -> Self {
        match result.to_hook_decision() {
            None => Emission::allow(),
            Some(decision) => Emission {
                stdout: Some(decision.to_json().to_string()),
                exit_code: decision.exit_code(),
            },
        }
    }
}
