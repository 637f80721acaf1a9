use crate::error::Result;
use crate::fsio;
use crate::paths::WardPaths;
use serde_json::{Map, Value};
use std::fs;

/// Sentinel key marking a freshly written sideband. It is the only
/// underscore-prefixed key allowed through the merge filter.
pub const REFRESH_SENTINEL: &str = "_sideband_refreshed";

// NOTE: Why a sideband at all?
//
// The enforcer and the tracker can run concurrently against the same
// session. If both did read-modify-write on the durable state file, one
// of them would lose. Instead the enforcer writes only the keys it
// mutated to a per-session patch file; the tracker (single writer of the
// durable file) folds the patch in later. O(1) write cost for the
// enforcer, no coordination required.

/// Atomically replace the session's sideband with this patch plus the
/// refresh sentinel.
pub fn write_sideband(paths: &WardPaths, session_id: &str, patch: &Map<String, Value>) -> Result<()> {
    let mut document = patch.clone();
    document.insert(REFRESH_SENTINEL.to_string(), Value::Bool(true));
    fsio::write_json_atomic(&paths.sideband_file(session_id), &Value::Object(document))
}

/// Read a pending sideband, if any. Corrupt files read as absent.
pub fn read_sideband(paths: &WardPaths, session_id: &str) -> Option<Map<String, Value>> {
    match fsio::read_json_lenient(&paths.sideband_file(session_id))? {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

/// Remove a consumed (or abandoned) sideband.
pub fn delete_sideband(paths: &WardPaths, session_id: &str) -> Result<()> {
    let path = paths.sideband_file(session_id);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// The merge filter: overlay `patch` onto `target`, skipping keys that
/// begin with `_` except the refresh sentinel.
pub fn merge_keys(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if key.starts_with('_') && key != REFRESH_SENTINEL {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}
