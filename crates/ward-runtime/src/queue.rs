use crate::error::Result;
use crate::observe::Observation;
use serde_json::{Value, json};
use ward_core::fsio;
use ward_core::paths::WardPaths;

/// Append-only handoff to the memory worker: one JSON line per
/// observation, line-capped so an absent worker cannot grow the file
/// without bound.
#[derive(Debug, Clone)]
pub struct CaptureQueue {
    paths: WardPaths,
    cap: usize,
}

impl CaptureQueue {
    pub fn new(paths: WardPaths, cap: usize) -> Self {
        CaptureQueue { paths, cap }
    }

    pub fn enqueue(&self, observation: &Observation) -> Result<()> {
        let line = json!({
            "document": observation.document,
            "metadata": observation.metadata,
        });
        fsio::append_jsonl_capped(&self.paths.capture_queue_file(), &line, self.cap)?;
        Ok(())
    }

    /// Drain up to `limit` pending lines (oldest first), rewriting the
    /// file with the remainder. Used by the worker-facing flush path.
    pub fn drain(&self, limit: usize) -> Result<Vec<Value>> {
        let path = self.paths.capture_queue_file();
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Ok(Vec::new());
        };
        let mut drained = Vec::new();
        let mut remainder = Vec::new();
        for line in content.lines() {
            if drained.len() < limit {
                match serde_json::from_str(line) {
                    Ok(value) => drained.push(value),
                    Err(_) => continue,
                }
            } else {
                remainder.push(line.to_string());
            }
        }
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        let mut body = remainder.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &path)?;
        Ok(drained)
    }

    pub fn len(&self) -> usize {
        std::fs::read_to_string(self.paths.capture_queue_file())
            .map(|content| content.lines().count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
