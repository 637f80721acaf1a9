use serde_json::json;
use ward_core::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use ward_core::paths::WardPaths;
use ward_core::state::{SessionState, StateStore};
use ward_types::Tier;

// End-to-end checks of the substrate invariants through the public API
// only: what a fresh process would actually observe on disk.

#[test]
fn caps_hold_after_a_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let paths = WardPaths::new(dir.path());
    let store = StateStore::new(paths.clone());
    let now = 10_000.0;

    let mut state = SessionState::new(now);
    for i in 0..250 {
        state.record_block_outcome("gate_01_read_before_edit", "Edit", "unread file", i as f64);
        state.canary_recent_seq.push(format!("fp{i}"));
        state.rate_window_timestamps.push(now - (i as f64) * 2.0);
    }
    for i in 0..900 {
        state.canary_short_timestamps.push(i as f64);
        state.canary_long_timestamps.push(i as f64);
    }
    store.save("capped", &mut state, now).unwrap();

    let reloaded = store.load("capped", now);
    assert_eq!(reloaded.gate_block_outcomes.len(), 100);
    assert_eq!(reloaded.gate_block_outcomes.last().unwrap().ts, 249.0);
    assert_eq!(reloaded.canary_recent_seq.len(), 10);
    assert_eq!(reloaded.canary_short_timestamps.len(), 600);
    assert_eq!(reloaded.canary_long_timestamps.len(), 600);
    assert!(
        reloaded
            .rate_window_timestamps
            .iter()
            .all(|ts| now - ts <= 120.0)
    );
}

#[test]
fn breaker_recovery_timeline_across_process_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let circuits = dir.path().join(".gate_circuits.json");
    let gate = "gate_05_proof_before_fixed";

    // Process 1: three crashes open the circuit.
    {
        let mut breaker = CircuitBreaker::new(circuits.clone(), BreakerConfig::gates());
        for i in 0..3 {
            breaker.record_result(gate, Tier::Two, false, 1_000.0 + i as f64);
        }
        assert_eq!(breaker.state_of(gate), CircuitState::Open);
    }

    // Process 2, inside the cooldown: still skipped.
    {
        let mut breaker = CircuitBreaker::new(circuits.clone(), BreakerConfig::gates());
        assert!(breaker.should_skip(gate, Tier::Two, 1_030.0));
    }

    // Process 3, past the cooldown: probe runs, success closes.
    {
        let mut breaker = CircuitBreaker::new(circuits.clone(), BreakerConfig::gates());
        assert!(!breaker.should_skip(gate, Tier::Two, 1_070.0));
        breaker.record_result(gate, Tier::Two, true, 1_071.0);
        assert_eq!(breaker.state_of(gate), CircuitState::Closed);
    }

    // Process 4 sees the closed circuit on disk.
    {
        let mut breaker = CircuitBreaker::new(circuits, BreakerConfig::gates());
        assert!(!breaker.should_skip(gate, Tier::Two, 1_072.0));
    }
}

#[test]
fn tier_one_survives_any_crash_storm() {
    let dir = tempfile::tempdir().unwrap();
    let mut breaker = CircuitBreaker::new(
        dir.path().join(".gate_circuits.json"),
        BreakerConfig::gates(),
    );
    for gate in [
        "gate_01_read_before_edit",
        "gate_02_no_destroy",
        "gate_03_test_before_deploy",
    ] {
        for i in 0..100 {
            breaker.record_result(gate, Tier::One, false, i as f64);
            assert!(
                !breaker.should_skip(gate, Tier::One, i as f64),
                "{gate} must never be skipped"
            );
        }
        assert_eq!(breaker.state_of(gate), CircuitState::Closed);
    }
}

#[test]
fn corrupt_telemetry_files_never_wedge_a_load() {
    let dir = tempfile::tempdir().unwrap();
    let paths = WardPaths::new(dir.path());
    std::fs::write(paths.circuits_file(), "{{{{").unwrap();
    std::fs::write(paths.qtable_file(), "no").unwrap();
    std::fs::write(paths.timings_file(), json!([1, 2, 3]).to_string()).unwrap();

    let mut breaker = CircuitBreaker::new(paths.circuits_file(), BreakerConfig::gates());
    assert!(!breaker.should_skip("gate_05_proof_before_fixed", Tier::Two, 0.0));

    let router = ward_core::Router::load(&paths);
    assert!(!router.order("Edit", "balanced").is_empty());

    let timings = ward_core::GateTimings::load(&paths);
    assert!(timings.stats().is_empty());
}
