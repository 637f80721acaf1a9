use crate::{Gate, GateContext, GateError};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Component, Path, PathBuf};
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_13_workspace_isolation";

/// A claim older than this is abandoned and free to take over.
const CLAIM_TTL_S: f64 = 1_800.0;

/// Per-file session claims: two concurrent sessions must not edit the
/// same file. Claims live in `.file_claims.json` keyed by normalized
/// absolute path; the winning session refreshes its claim on every edit.
pub struct WorkspaceIsolation;

/// Lexical normalization so `/tmp//foo.py` and `/tmp/bar/../foo.py`
/// land on the same claim key. Purely lexical: claimed files may not
/// exist yet, so `fs::canonicalize` is not an option here.
fn normalize_claim_path(raw: &str) -> String {
    let mut normalized = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized.to_string_lossy().into_owned()
}

fn load_claims(ctx: &GateContext<'_>) -> Map<String, Value> {
    match fs::read_to_string(ctx.paths.claims_file()) {
        Ok(raw) => serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|value| match value {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .unwrap_or_default(),
        Err(_) => Map::new(),
    }
}

fn store_claims(ctx: &GateContext<'_>, claims: Map<String, Value>) -> Result<(), GateError> {
    let path = ctx.paths.claims_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, serde_json::to_string(&Value::Object(claims))?)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

impl Gate for WorkspaceIsolation {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        _state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PostToolUse {
            return Ok(GateResult::pass(ID));
        }
        let file_path = normalize_claim_path(ctx.input_str("file_path"));
        if file_path.is_empty() {
            return Ok(GateResult::pass(ID));
        }

        let mut claims = load_claims(ctx);
        if let Some(claim) = claims.get(&file_path) {
            let claimed_at = claim.get("claimed_at").and_then(Value::as_f64).unwrap_or(0.0);
            let age = ctx.now - claimed_at;
            // A claim without a session_id is malformed, not foreign;
            // it falls through to be re-claimed below.
            if let Some(owner) = claim.get("session_id").and_then(Value::as_str)
                && owner != ctx.session_id
                && age <= CLAIM_TTL_S
            {
                let message = format!(
                    "{file_path} is claimed by session {owner} ({age:.0}s ago). \
                     Work elsewhere or wait for the claim to lapse."
                );
                return Ok(GateResult::block(ID, message).with_severity(Severity::Error));
            }
        }

        claims.insert(
            file_path,
            json!({"session_id": ctx.session_id, "claimed_at": ctx.now}),
        );
        store_claims(ctx, claims)?;
        Ok(GateResult::pass(ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;

    fn claim(fixture: &Fixture, path: &str, session: &str, at: f64) {
        let mut claims = Map::new();
        claims.insert(
            path.to_string(),
            json!({"session_id": session, "claimed_at": at}),
        );
        fs::write(
            fixture.paths.claims_file(),
            serde_json::to_string(&Value::Object(claims)).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn foreign_fresh_claim_blocks_naming_the_owner() {
        let fixture = Fixture::new();
        claim(&fixture, "/tmp/y.py", "A", 1_000.0);
        let input = json!({"file_path": "/tmp/y.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_100.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(result.blocked);
        assert!(result.message.contains("session A"));
    }

    #[test]
    fn stale_claim_is_taken_over() {
        let fixture = Fixture::new();
        claim(&fixture, "/tmp/y.py", "A", 1_000.0);
        let input = json!({"file_path": "/tmp/y.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_000.0 + CLAIM_TTL_S + 1.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(!result.blocked);

        let claims = load_claims(&ctx);
        assert_eq!(claims["/tmp/y.py"]["session_id"], "test-session");
    }

    #[test]
    fn own_claim_is_refreshed_not_blocked() {
        let fixture = Fixture::new();
        claim(&fixture, "/tmp/y.py", "test-session", 1_000.0);
        let input = json!({"file_path": "/tmp/y.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_200.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(!result.blocked);
        let claims = load_claims(&ctx);
        assert_eq!(claims["/tmp/y.py"]["claimed_at"], 1_200.0);
    }

    #[test]
    fn unclaimed_file_gets_claimed() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/fresh.py"});
        let ctx = fixture.ctx("Write", &input, EventType::PreToolUse, 10.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(!result.blocked);
        assert!(load_claims(&ctx).contains_key("/tmp/fresh.py"));
    }

    #[test]
    fn double_slash_path_hits_the_same_claim() {
        let fixture = Fixture::new();
        claim(&fixture, "/tmp/foo.py", "A", 1_000.0);
        let input = json!({"file_path": "/tmp//foo.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_100.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(result.blocked);
        assert!(result.message.contains("session A"));
    }

    #[test]
    fn parent_dir_segments_hit_the_same_claim() {
        let fixture = Fixture::new();
        claim(&fixture, "/tmp/foo.py", "A", 1_000.0);
        let input = json!({"file_path": "/tmp/bar/../foo.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_100.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(result.blocked);
    }

    #[test]
    fn new_claims_are_stored_under_the_normalized_key() {
        let fixture = Fixture::new();
        let input = json!({"file_path": "/tmp/./sub//..//fresh.py"});
        let ctx = fixture.ctx("Write", &input, EventType::PreToolUse, 10.0);

        let result = WorkspaceIsolation
            .check(&ctx, &mut SessionState::default())
            .unwrap();
        assert!(!result.blocked);
        let claims = load_claims(&ctx);
        assert!(claims.contains_key("/tmp/fresh.py"));
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn malformed_claims_never_block() {
        let fixture = Fixture::new();
        let claims = json!({
            "/tmp/bad1.py": null,
            "/tmp/bad2.py": "not-a-map",
            "/tmp/bad3.py": {"claimed_at": 1_000.0},
        });
        fs::write(fixture.paths.claims_file(), claims.to_string()).unwrap();

        for path in ["/tmp/bad1.py", "/tmp/bad2.py", "/tmp/bad3.py"] {
            let input = json!({"file_path": path});
            let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_100.0);
            let result = WorkspaceIsolation
                .check(&ctx, &mut SessionState::default())
                .unwrap();
            assert!(!result.blocked, "{path} should fall through to re-claim");
        }

        // The malformed entries were re-claimed by this session.
        let input = json!({"file_path": "/tmp/bad3.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 1_100.0);
        let reclaimed = load_claims(&ctx);
        assert_eq!(reclaimed["/tmp/bad3.py"]["session_id"], "test-session");
    }

    #[test]
    fn corrupt_claims_file_reads_as_empty() {
        let fixture = Fixture::new();
        fs::write(fixture.paths.claims_file(), "[not json").unwrap();
        let input = json!({"file_path": "/tmp/z.py"});
        let ctx = fixture.ctx("Edit", &input, EventType::PreToolUse, 10.0);
        assert!(
            !WorkspaceIsolation
                .check(&ctx, &mut SessionState::default())
                .unwrap()
                .blocked
        );
    }
}
