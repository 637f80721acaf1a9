use anyhow::Result;
use std::time::SystemTime;
use walkdir::WalkDir;
use ward_core::paths::WardPaths;

/// Delete state (and orphaned sidebands) for sessions idle longer than
/// the cutoff. The out-of-band compactor for a store whose sessions are
/// otherwise never destroyed.
pub fn run(paths: &WardPaths, max_age_days: u64) -> Result<i32> {
    let cutoff = SystemTime::now()
        .checked_sub(std::time::Duration::from_secs(max_age_days * 86_400))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0usize;
    for entry in WalkDir::new(paths.state_dir())
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let stale = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(|mtime| mtime < cutoff)
            .unwrap_or(false);
        if stale {
            match std::fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(err) => eprintln!("ward: could not remove {}: {err}", path.display()),
            }
        }
    }

    println!("removed {removed} stale session file(s) (idle > {max_age_days}d)");
    Ok(0)
}
