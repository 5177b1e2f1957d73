//! Append-only line-delimited pending-job log. The API appends, the worker
//! drains and truncates. No durable per-entry delivery guarantee: a crash
//! between read and truncate can lose in-flight lines (non-goal:
//! exactly-once delivery — see the concurrency section).

use std::path::PathBuf;

use crate::error::Result;
use crate::models::QueueEntry;

pub struct FileQueue {
    path: PathBuf,
}

impl FileQueue {
    pub fn new(path: PathBuf) -> Self {
        FileQueue { path }
    }

    /// Atomically reads all non-empty lines, truncates the file, and returns
    /// the parsed entries. Skips (rather than fails on) any line that is not
    /// valid JSON, since a half-written line from a racing writer should not
    /// wedge the worker.
    pub fn drain(&self) -> Result<Vec<QueueEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        std::fs::write(&self.path, "")?;

        let entries = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<QueueEntry>(line).ok())
            .collect();
        Ok(entries)
    }
}
