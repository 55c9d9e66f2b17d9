//! Progress State Tracker: records what the Extraction Worker is doing
//! so the Supervisor (and `ccmem show`) can tell a live run from a crashed one.
//!
//! Grounded in wm's `extract.rs` last-extracted timestamp bookkeeping, generalized into a
//! richer status document since this pipeline supervises a long-lived worker subprocess
//! rather than a single synchronous extraction call, with a per-transcript list so a
//! resumed or interrupted run can tell exactly which transcripts finished, which one is
//! in flight, and which are still waiting.

use crate::error::ProgressError;
use crate::lockfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// The classification `ccmem show`/the Supervisor derive from a progress state file,
/// accounting for the possibility that the worker died without updating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NoState,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// A `Running` state whose pid is no longer alive.
    Crashed,
    /// A `Running` state whose last heartbeat is older than the stale threshold, pid alive
    /// or unknown.
    Stale,
}

/// Per-transcript status within a run, as tracked in `ProgressState::transcripts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptProgress {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memories: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptProgress {
    pub fn pending(id: impl Into<String>) -> Self {
        Self { id: id.into(), status: TranscriptStatus::Pending, memories: None, completed_at: None, error: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    pub pid: u32,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    pub transcripts: Vec<TranscriptProgress>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressState {
    pub fn transcripts_total(&self) -> usize {
        self.transcripts.len()
    }

    pub fn transcripts_done(&self) -> usize {
        self.transcripts
            .iter()
            .filter(|t| matches!(t.status, TranscriptStatus::Completed | TranscriptStatus::Failed))
            .count()
    }
}

pub struct ProgressTracker {
    path: PathBuf,
}

impl ProgressTracker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        lockfile::atomic_write(&self.path, &bytes).map_err(|source| ProgressError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn load(&self) -> Result<Option<ProgressState>, ProgressError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path).map_err(|source| ProgressError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn clear(&self) -> Result<(), ProgressError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|source| ProgressError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Update one transcript's record in place by `session_id`, bump the run's heartbeat,
    /// and persist. A no-op if no progress state exists or the id isn't tracked (the run
    /// already finished or was cleared out from under the caller).
    pub fn update_transcript(
        &self,
        session_id: &str,
        status: TranscriptStatus,
        memories: Option<usize>,
        error: Option<String>,
    ) -> Result<(), ProgressError> {
        if let Some(mut state) = self.load()? {
            if let Some(entry) = state.transcripts.iter_mut().find(|t| t.id == session_id) {
                entry.status = status;
                if memories.is_some() {
                    entry.memories = memories;
                }
                entry.error = error;
                if matches!(status, TranscriptStatus::Completed | TranscriptStatus::Failed) {
                    entry.completed_at = Some(Utc::now());
                }
            }
            state.last_heartbeat = Utc::now();
            self.save(&state)?;
        }
        Ok(())
    }

    /// Classify the current state file, checking pid liveness and heartbeat
    /// staleness for a `Running` record.
    pub fn classify(&self, stale_threshold: Duration) -> Result<RunOutcome, ProgressError> {
        let state = match self.load()? {
            Some(s) => s,
            None => return Ok(RunOutcome::NoState),
        };

        match state.status {
            RunStatus::Completed => Ok(RunOutcome::Completed),
            RunStatus::Failed => Ok(RunOutcome::Failed),
            RunStatus::Cancelled => Ok(RunOutcome::Cancelled),
            RunStatus::Running => {
                if !pid_is_alive(state.pid) {
                    return Ok(RunOutcome::Crashed);
                }
                let age = Utc::now().signed_duration_since(state.last_heartbeat);
                if age.to_std().unwrap_or(Duration::ZERO) > stale_threshold {
                    Ok(RunOutcome::Stale)
                } else {
                    Ok(RunOutcome::Running)
                }
            }
        }
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: RunStatus, pid: u32, heartbeat: DateTime<Utc>, transcripts: Vec<TranscriptProgress>) -> ProgressState {
        ProgressState {
            pid,
            status,
            started_at: heartbeat,
            last_heartbeat: heartbeat,
            transcripts,
            error: None,
        }
    }

    #[test]
    fn no_state_file_classifies_as_no_state() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        assert_eq!(tracker.classify(Duration::from_secs(600)).unwrap(), RunOutcome::NoState);
    }

    #[test]
    fn completed_state_classifies_as_completed() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        tracker.save(&state(RunStatus::Completed, std::process::id(), Utc::now(), vec![])).unwrap();
        assert_eq!(tracker.classify(Duration::from_secs(600)).unwrap(), RunOutcome::Completed);
    }

    #[test]
    fn running_with_dead_pid_classifies_as_crashed() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        // pid 999999 is extremely unlikely to be alive in any test environment.
        tracker.save(&state(RunStatus::Running, 999_999, Utc::now(), vec![])).unwrap();
        assert_eq!(tracker.classify(Duration::from_secs(600)).unwrap(), RunOutcome::Crashed);
    }

    #[test]
    fn running_with_live_pid_and_fresh_heartbeat_is_running() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        tracker.save(&state(RunStatus::Running, std::process::id(), Utc::now(), vec![])).unwrap();
        assert_eq!(tracker.classify(Duration::from_secs(600)).unwrap(), RunOutcome::Running);
    }

    #[test]
    fn running_with_stale_heartbeat_is_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        let old = Utc::now() - chrono::Duration::seconds(3600);
        tracker.save(&state(RunStatus::Running, std::process::id(), old, vec![])).unwrap();
        assert_eq!(tracker.classify(Duration::from_secs(600)).unwrap(), RunOutcome::Stale);
    }

    #[test]
    fn clear_removes_state_file() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        tracker.save(&state(RunStatus::Completed, 1, Utc::now(), vec![])).unwrap();
        tracker.clear().unwrap();
        assert!(tracker.load().unwrap().is_none());
    }

    #[test]
    fn update_transcript_tracks_mixed_statuses_across_a_run() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        tracker
            .save(&state(
                RunStatus::Running,
                std::process::id(),
                Utc::now(),
                vec![
                    TranscriptProgress::pending("t1"),
                    TranscriptProgress::pending("t2"),
                    TranscriptProgress::pending("t3"),
                ],
            ))
            .unwrap();

        tracker.update_transcript("t1", TranscriptStatus::InProgress, None, None).unwrap();
        tracker.update_transcript("t1", TranscriptStatus::Completed, Some(3), None).unwrap();
        tracker.update_transcript("t2", TranscriptStatus::InProgress, None, None).unwrap();

        let loaded = tracker.load().unwrap().unwrap();
        assert_eq!(loaded.transcripts[0].status, TranscriptStatus::Completed);
        assert_eq!(loaded.transcripts[0].memories, Some(3));
        assert!(loaded.transcripts[0].completed_at.is_some());
        assert_eq!(loaded.transcripts[1].status, TranscriptStatus::InProgress);
        assert_eq!(loaded.transcripts[2].status, TranscriptStatus::Pending);
        assert_eq!(loaded.transcripts_done(), 1);
        assert_eq!(loaded.transcripts_total(), 3);
    }

    #[test]
    fn update_transcript_records_failure_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::new(tmp.path().join("state.json"));
        tracker
            .save(&state(RunStatus::Running, std::process::id(), Utc::now(), vec![TranscriptProgress::pending("t1")]))
            .unwrap();

        tracker.update_transcript("t1", TranscriptStatus::Failed, None, Some("llm timeout".to_string())).unwrap();

        let loaded = tracker.load().unwrap().unwrap();
        assert_eq!(loaded.transcripts[0].status, TranscriptStatus::Failed);
        assert_eq!(loaded.transcripts[0].error.as_deref(), Some("llm timeout"));
        assert!(loaded.transcripts[0].completed_at.is_some());
    }
}
