//! Extraction Queue: an append-only JSONL work queue between the Hook
//! Router and the Background Processor.
//!
//! Grounded in `opencode-mem`'s queue processor (`queue_processor.rs`), which decouples a
//! fast producer path from a periodic drain loop. Appends use the shared advisory-locked
//! append helper in `lockfile`; draining takes the exclusive lock for the whole
//! read-then-truncate so no job is lost or duplicated between a producer and the drainer.

use crate::error::QueueError;
use crate::lockfile::{self, ExclusiveLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub session_id: String,
    pub transcript_path: String,
    pub enqueued_at: DateTime<Utc>,
}

pub struct ExtractionQueue {
    path: PathBuf,
}

impl ExtractionQueue {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one job line. Cheap and lock-scoped to the single append — this is called
    /// from the Hook Router's hot path and must never block on the drain loop for long.
    pub fn enqueue(&self, session_id: &str, transcript_path: &str) -> Result<(), QueueError> {
        let job = QueueJob {
            session_id: session_id.to_string(),
            transcript_path: transcript_path.to_string(),
            enqueued_at: Utc::now(),
        };
        let line = serde_json::to_string(&job).map_err(|_| QueueError::Write {
            path: self.path.display().to_string(),
            source: std::io::Error::other("failed to serialize queue job"),
        })?;
        lockfile::append_line_locked(&self.path, &line).map_err(|source| QueueError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Take exclusive ownership of the queue file, read every pending job, then truncate.
    /// Malformed lines are skipped rather than failing the drain.
    pub fn drain(&self) -> Result<Vec<QueueJob>, QueueError> {
        let _guard = ExclusiveLock::acquire(&self.path).map_err(|source| QueueError::Lock {
            path: self.path.display().to_string(),
            source,
        })?;

        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|source| QueueError::Open {
            path: self.path.display().to_string(),
            source,
        })?;

        let jobs: Vec<QueueJob> = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(job) => Some(job),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed queue line");
                    None
                }
            })
            .collect();

        lockfile::atomic_write(&self.path, b"").map_err(|source| QueueError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(jobs)
    }

    pub fn size(&self) -> Result<usize, QueueError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|source| QueueError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(contents.lines().filter(|l| !l.trim().is_empty()).count())
    }
}
