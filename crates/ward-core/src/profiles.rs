use crate::registry::tier_of;
use crate::state::SessionState;
use ward_types::Tier;

/// How a profile wants a gate handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Block,
    Warn,
    Disabled,
}

pub const DEFAULT_PROFILE: &str = "balanced";
pub const VALID_PROFILES: &[&str] = &["strict", "balanced", "permissive", "refactor"];

struct ProfileSpec {
    name: &'static str,
    #[allow(dead_code)]
    description: &'static str,
    gate_modes: &'static [(&'static str, GateMode)],
}

// Gate keys may be short names; `gate_05` covers
// `gate_05_proof_before_fixed`.
const PROFILES: &[ProfileSpec] = &[
    ProfileSpec {
        name: "strict",
        description: "Every gate at full strength; nothing downgraded.",
        gate_modes: &[],
    },
    ProfileSpec {
        name: "balanced",
        description: "The default posture.",
        gate_modes: &[],
    },
    ProfileSpec {
        name: "permissive",
        description: "Exploratory work: advisory gates off, proof gates soften.",
        gate_modes: &[
            ("gate_04", GateMode::Warn),
            ("gate_05", GateMode::Warn),
            ("gate_14", GateMode::Disabled),
            ("gate_16", GateMode::Disabled),
        ],
    },
    ProfileSpec {
        name: "refactor",
        description: "Large mechanical changes: memory-freshness and save-fix nag off.",
        gate_modes: &[
            ("gate_04", GateMode::Warn),
            ("gate_06", GateMode::Warn),
            ("gate_14", GateMode::Disabled),
        ],
    },
];

/// The active profile name, validated against the known set; anything
/// else falls back to balanced.
pub fn profile_for(state: &SessionState) -> &'static str {
    VALID_PROFILES
        .iter()
        .find(|name| **name == state.security_profile)
        .copied()
        .unwrap_or(DEFAULT_PROFILE)
}

fn key_matches(entry: &str, gate_id: &str) -> bool {
    if entry == gate_id {
        return true;
    }
    gate_id
        .strip_prefix(entry)
        .is_some_and(|rest| rest.starts_with('_'))
        || entry
            .strip_prefix(gate_id)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// The mode this profile runs a gate in. Tier-1 gates are never
/// downgraded or disabled, whatever the profile says.
pub fn gate_mode(profile: &str, gate_id: &str) -> GateMode {
    if tier_of(gate_id) == Tier::One {
        return GateMode::Block;
    }
    let spec = PROFILES
        .iter()
        .find(|spec| spec.name == profile)
        .or_else(|| PROFILES.iter().find(|spec| spec.name == DEFAULT_PROFILE));
    let Some(spec) = spec else {
        return GateMode::Block;
    };
    spec.gate_modes
        .iter()
        .find(|(entry, _)| key_matches(entry, gate_id))
        .map(|(_, mode)| *mode)
        .unwrap_or(GateMode::Block)
}

pub fn is_disabled(profile: &str, gate_id: &str) -> bool {
    gate_mode(profile, gate_id) == GateMode::Disabled
}
