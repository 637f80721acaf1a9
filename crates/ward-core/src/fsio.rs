use crate::error::Result;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

// NOTE: Concurrency model for shared telemetry files
//
// Several invocations may race on the circuit/Q-table/timing files. There
// are no file locks: every writer does read-full-document, mutate
// in-memory, write-to-temp, rename. The rename is atomic within a
// directory, so readers always see a complete document; a concurrent
// writer can lose an update, which the loss model tolerates for
// telemetry. The durable session state is exempt from this race because
// it has exactly one writer (the tracker).

/// Write a JSON document via temp-file-then-rename in the same directory.
pub fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(serde_json::to_string(value)?.as_bytes())?;
        file.write_all(b"\n")?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON document, tolerating absence and corruption.
///
/// Missing file → `None`. Unparseable file (e.g. a torn partial write
/// from a crashed process) → `None` plus a stderr warning; callers fall
/// back to defaults.
pub fn read_json_lenient(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("ward: unreadable {} ({}), using defaults", path.display(), err);
            None
        }
    }
}

/// Append one JSON line.
pub fn append_jsonl(path: &Path, line: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(serde_json::to_string(line)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Append one JSON line, then truncate the file to its newest `cap`
/// lines when it grows past the cap.
pub fn append_jsonl_capped(path: &Path, line: &Value, cap: usize) -> Result<()> {
    append_jsonl(path, line)?;

    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() > cap {
        let keep = &lines[lines.len() - cap..];
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, format!("{}\n", keep.join("\n")))?;
        fs::rename(&tmp, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn atomic_write_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_json_atomic(&path, &json!({"k": 1})).unwrap();
        assert_eq!(read_json_lenient(&path).unwrap()["k"], 1);
    }

    #[test]
    fn lenient_read_absorbs_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.json");
        fs::write(&path, "{\"k\": tru").unwrap();
        assert!(read_json_lenient(&path).is_none());
        assert!(read_json_lenient(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn jsonl_cap_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.jsonl");
        for i in 0..7 {
            append_jsonl_capped(&path, &json!({"i": i}), 5).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("\"i\":2"));
        assert!(lines[4].contains("\"i\":6"));
    }
}
