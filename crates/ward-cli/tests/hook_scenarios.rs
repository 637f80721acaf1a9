use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

fn ward(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ward").expect("ward binary");
    cmd.args(["--root", root.to_str().unwrap()]);
    cmd
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs_f64()
}

fn seed_state(root: &Path, session: &str, state: Value) {
    let dir = root.join("state");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{session}.json")), state.to_string()).unwrap();
}

#[test]
fn edit_of_unread_file_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    ward(dir.path())
        .arg("hook")
        .write_stdin(
            json!({
                "event_type": "PreToolUse",
                "tool_name": "Edit",
                "tool_input": {"file_path": "/tmp/x.py"},
                "session_id": "s1",
            })
            .to_string(),
        )
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"permissionDecision\":\"deny\""))
        .stdout(predicate::str::contains("Read"));
}

#[test]
fn normal_edit_is_silently_allowed() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(
        dir.path(),
        "s2",
        json!({
            "files_read": ["/tmp/x.py"],
            "memory_last_queried": epoch_now(),
        }),
    );

    ward(dir.path())
        .arg("hook")
        .write_stdin(
            json!({
                "event_type": "PreToolUse",
                "tool_name": "Edit",
                "tool_input": {"file_path": "/tmp/x.py"},
                "session_id": "s2",
            })
            .to_string(),
        )
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());

    // The pass decisions landed in today's audit file.
    let audit = std::fs::read_dir(dir.path().join("audit"))
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name() != "trail.jsonl")
        .expect("daily audit file");
    let content = std::fs::read_to_string(audit.path()).unwrap();
    let first: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["decision"], "pass");
}

#[test]
fn destructive_shell_is_denied_with_critical_severity() {
    let dir = tempfile::tempdir().unwrap();
    ward(dir.path())
        .arg("hook")
        .write_stdin(
            json!({
                "event_type": "PreToolUse",
                "tool_name": "Bash",
                "tool_input": {"command": "rm -rf /"},
                "session_id": "s3",
            })
            .to_string(),
        )
        .assert()
        .code(2)
        .stdout(predicate::str::contains("deny"));

    let trail = std::fs::read_to_string(dir.path().join("audit/trail.jsonl")).unwrap();
    let blocked: Value = trail
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .find(|entry: &Value| entry["decision"] == "block")
        .expect("block row");
    assert_eq!(blocked["severity"], "critical");
}

#[test]
fn critical_file_edit_asks_instead_of_denying() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(
        dir.path(),
        "s4",
        json!({
            "files_read": ["/repo/Cargo.lock"],
            "memory_last_queried": epoch_now(),
        }),
    );

    let assert = ward(dir.path())
        .arg("hook")
        .write_stdin(
            json!({
                "event_type": "PreToolUse",
                "tool_name": "Edit",
                "tool_input": {"file_path": "/repo/Cargo.lock"},
                "session_id": "s4",
            })
            .to_string(),
        )
        .assert()
        .code(0);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let parsed: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(parsed["hookSpecificOutput"]["permissionDecision"], "ask");
    assert!(
        parsed["hookSpecificOutput"]["reason"]
            .as_str()
            .unwrap()
            .contains("lockfile")
    );
}

#[test]
fn malformed_payload_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    ward(dir.path())
        .arg("hook")
        .write_stdin("this is not json")
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("allowing"));

    ward(dir.path())
        .arg("hook")
        .write_stdin(json!({"tool_name": "Edit"}).to_string())
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn post_event_always_exits_zero_and_persists_state() {
    let dir = tempfile::tempdir().unwrap();
    ward(dir.path())
        .arg("hook")
        .write_stdin(
            json!({
                "event_type": "PostToolUse",
                "tool_name": "Read",
                "tool_input": {"file_path": "/tmp/seen.py"},
                "tool_response": {"stdout": "contents", "exit_code": 0},
                "session_id": "post-1",
            })
            .to_string(),
        )
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("state/post-1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["total_tool_calls"], 1);
    assert_eq!(state["files_read"][0], "/tmp/seen.py");
    assert!(dir.path().join(".capture_queue.jsonl").exists());
}

#[test]
fn track_merges_a_pending_sideband() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::write(
        state_dir.join("t1.sideband.json"),
        json!({"gate6_warn_count": 4, "_sideband_refreshed": true}).to_string(),
    )
    .unwrap();

    ward(dir.path())
        .args(["track", "--session", "t1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged sideband"));

    let state: Value =
        serde_json::from_str(&std::fs::read_to_string(state_dir.join("t1.json")).unwrap()).unwrap();
    assert_eq!(state["gate6_warn_count"], 4);
    assert!(!state_dir.join("t1.sideband.json").exists());
}

#[test]
fn stats_reports_in_both_formats() {
    let dir = tempfile::tempdir().unwrap();
    ward(dir.path())
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ward status"));

    let assert = ward(dir.path())
        .args(["stats", "--format", "json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let parsed: Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed.get("circuits").is_some());
}

#[test]
fn gc_removes_only_stale_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    let stale = state_dir.join("old.json");
    let fresh = state_dir.join("new.json");
    std::fs::write(&stale, "{}").unwrap();
    std::fs::write(&fresh, "{}").unwrap();

    let thirty_days_ago = filetime::FileTime::from_unix_time(
        (epoch_now() as i64) - 30 * 86_400,
        0,
    );
    filetime::set_file_mtime(&stale, thirty_days_ago).unwrap();

    ward(dir.path())
        .args(["gc", "--max-age-days", "14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 1"));

    assert!(!stale.exists());
    assert!(fresh.exists());
}
