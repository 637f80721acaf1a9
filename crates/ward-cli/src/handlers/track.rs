use anyhow::{Context, Result};
use ward_core::clock::{Clock, SystemClock};
use ward_core::paths::WardPaths;
use ward_runtime::Tracker;

/// Manually merge a session's pending sideband (normally this happens
/// inside the PostToolUse invocation).
pub fn run(paths: &WardPaths, session_id: &str) -> Result<i32> {
    let tracker = Tracker::new(paths.clone());
    let merged = tracker
        .merge(session_id, SystemClock.epoch_secs())
        .with_context(|| format!("Failed to merge sideband for session {session_id}"))?;
    if merged {
        println!("merged sideband for {session_id}");
    } else {
        println!("no pending sideband for {session_id}");
    }
    Ok(0)
}
