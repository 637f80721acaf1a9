use crate::error::{Error, Result};
use ward_types::Tier;

/// One row of the gate table: identity, priority class, and the tools it
/// watches (`None` = universal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSpec {
    pub id: &'static str,
    pub tier: Tier,
    pub tools: Option<&'static [&'static str]>,
}

const EDIT_TOOLS: &[&str] = &["Edit", "Write", "NotebookEdit"];
const FILE_MUTATORS: &[&str] = &["Edit", "Write"];

/// The single source of truth for gate identity and priority.
///
/// List order is canonical execution priority: Tier 1 first, the rate
/// limiter last so cheaper gates get a chance to veto before a call is
/// charged against the window. Dormant gates (gate_08_temporal) and
/// merged ones (gate_12_plan_mode_save, folded into gate_06) are absent.
pub const GATE_MODULES: &[GateSpec] = &[
    GateSpec {
        id: "gate_01_read_before_edit",
        tier: Tier::One,
        tools: Some(EDIT_TOOLS),
    },
    GateSpec {
        id: "gate_02_no_destroy",
        tier: Tier::One,
        tools: Some(&["Bash"]),
    },
    GateSpec {
        id: "gate_03_test_before_deploy",
        tier: Tier::One,
        tools: Some(&["Bash"]),
    },
    GateSpec {
        id: "gate_04_memory_first",
        tier: Tier::Two,
        tools: Some(&["Edit", "Write", "Task"]),
    },
    GateSpec {
        id: "gate_05_proof_before_fixed",
        tier: Tier::Two,
        tools: Some(&["Bash"]),
    },
    GateSpec {
        id: "gate_06_save_fix",
        tier: Tier::Two,
        tools: Some(FILE_MUTATORS),
    },
    GateSpec {
        id: "gate_07_critical_file_guard",
        tier: Tier::Two,
        tools: Some(&["Edit", "Write", "Bash"]),
    },
    GateSpec {
        id: "gate_10_model_enforcement",
        tier: Tier::Two,
        tools: Some(&["Task"]),
    },
    GateSpec {
        id: "gate_13_workspace_isolation",
        tier: Tier::Two,
        tools: Some(FILE_MUTATORS),
    },
    GateSpec {
        id: "gate_14_confidence_check",
        tier: Tier::Three,
        tools: Some(FILE_MUTATORS),
    },
    GateSpec {
        id: "gate_16_code_quality",
        tier: Tier::Three,
        tools: Some(FILE_MUTATORS),
    },
    GateSpec {
        id: "gate_17_injection_defense",
        tier: Tier::Two,
        tools: Some(&["WebFetch", "WebSearch", "mcp__*"]),
    },
    GateSpec {
        id: "gate_18_canary",
        tier: Tier::Two,
        tools: None,
    },
    GateSpec {
        id: "gate_11_rate_limit",
        tier: Tier::Two,
        tools: None,
    },
];

/// Look up a gate's tier; unknown gates read as Tier 3 (advisory).
pub fn tier_of(gate_id: &str) -> Tier {
    GATE_MODULES
        .iter()
        .find(|spec| spec.id == gate_id)
        .map(|spec| spec.tier)
        .unwrap_or(Tier::Three)
}

fn tool_matches(pattern: &str, tool: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        tool.starts_with(prefix)
    } else {
        pattern == tool
    }
}

/// All gates that watch this tool, in registry order. Universal gates
/// always apply; a trailing `*` in a map entry matches by prefix (used
/// for external MCP tools).
pub fn applicable_to(tool: &str) -> Vec<&'static GateSpec> {
    GATE_MODULES
        .iter()
        .filter(|spec| match spec.tools {
            None => true,
            Some(tools) => tools.iter().any(|pattern| tool_matches(pattern, tool)),
        })
        .collect()
}

/// Cross-check the table against the set of constructible gates.
///
/// Called once at pipeline start; a mismatch is a deployment bug, not a
/// runtime condition to fail open on.
pub fn validate(constructible: &[&str]) -> Result<()> {
    for spec in GATE_MODULES {
        if !constructible.contains(&spec.id) {
            return Err(Error::RegistryMismatch(format!(
                "registry lists '{}' but no gate implementation exists",
                spec.id
            )));
        }
    }
    for id in constructible {
        if !GATE_MODULES.iter().any(|spec| spec.id == *id) {
            return Err(Error::RegistryMismatch(format!(
                "gate implementation '{id}' missing from the registry"
            )));
        }
    }
    Ok(())
}
