//! Extraction Worker: the subprocess the Supervisor spawns to actually
//! run the two-pass extractor over every unprocessed transcript.
//!
//! Emits a line-delimited JSON protocol on stdout so the Supervisor can follow progress
//! without parsing log text, grounded in the same stdout-as-IPC shape wm's hook
//! commands use for their `HookResponse` JSON. Per-transcript failures are isolated: one
//! bad transcript logs an error and moves on rather than aborting the whole run.

use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::error::CcmemError;
use crate::memory::MemoryStore;
use crate::paths::Paths;
use crate::pipeline::{extract_transcript_with_progress, ExtractionOutcome};
use crate::progress::{ProgressState, ProgressTracker, RunStatus, TranscriptProgress, TranscriptStatus};
use crate::registry::TranscriptRegistry;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Line-delimited JSON events on stdout, field-compatible with the worker progress
/// protocol (`type`, `session_id`, and per-event payload fields).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage<'a> {
    Start { total_transcripts: usize },
    Progress { session_id: &'a str, current: usize, total: usize, stage: &'a str },
    TriageComplete { session_id: &'a str, ranges: usize, coverage: f64 },
    ExtractionProgress { session_id: &'a str, messages_processed: usize, messages_total: usize, percent: f64 },
    ExtractionComplete { session_id: &'a str, memories: usize },
    Error { session_id: &'a str, error: &'a str },
    NoWork,
    Summary { transcripts: usize, memories: usize, errors: usize, time: f64 },
}

fn emit(message: &WorkerMessage) {
    if let Ok(line) = serde_json::to_string(message) {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

/// Run the worker to completion. Returns an error only for conditions that make the whole
/// run meaningless (paths not initialized); individual transcript failures are reported as
/// `WorkerMessage::Error` events and surface as `RunStatus::Failed` (exit 1 on any
/// per-transcript failure after completing the batch) without short-circuiting the run.
pub async fn run(config: &Config) -> Result<RunStatus, CcmemError> {
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        return Err(CcmemError::NotInitialized);
    }
    paths.ensure_dirs()?;

    let registry = TranscriptRegistry::new(paths.transcript_registry());
    let store = MemoryStore::new(paths.memory_store(), config.max_memories);
    let progress = ProgressTracker::new(paths.progress_state());
    let breaker = CircuitBreaker::new(paths.breaker_state(), config.breaker_window, config.breaker_max_per_window);

    let pending = registry.get_unprocessed()?;

    if pending.is_empty() {
        emit(&WorkerMessage::NoWork);
        return Ok(RunStatus::Completed);
    }

    progress.save(&ProgressState {
        pid: std::process::id(),
        status: RunStatus::Running,
        started_at: Utc::now(),
        last_heartbeat: Utc::now(),
        transcripts: pending.iter().map(|record| TranscriptProgress::pending(record.session_id.clone())).collect(),
        error: None,
    })?;

    emit(&WorkerMessage::Start { total_transcripts: pending.len() });

    let started = Instant::now();
    let total = pending.len();
    let mut processed = 0usize;
    let mut total_memories = 0usize;
    let mut errors = 0usize;

    for record in &pending {
        progress.update_transcript(&record.session_id, TranscriptStatus::InProgress, None, None)?;
        emit(&WorkerMessage::Progress { session_id: &record.session_id, current: processed, total, stage: "triage" });

        // Allow a signal handler (installed by the Supervisor's caller) to cancel between
        // transcripts by checking for a Cancelled status written externally.
        if let Ok(Some(state)) = progress.load() {
            if state.status == RunStatus::Cancelled {
                break;
            }
        }

        match process_one_transcript(config, &breaker, &store, record, &progress).await {
            Ok(count) => {
                total_memories += count;
                progress.update_transcript(&record.session_id, TranscriptStatus::Completed, Some(count), None)?;
                registry.mark_transcript_processed(&record.session_id, count, None)?;
            }
            Err(err) => {
                errors += 1;
                let message = err.to_string();
                emit(&WorkerMessage::Error { session_id: &record.session_id, error: &message });
                progress.update_transcript(&record.session_id, TranscriptStatus::Failed, None, Some(message.clone()))?;
                registry.mark_transcript_processed(&record.session_id, 0, Some(message))?;
            }
        }

        processed += 1;
    }

    store.rotate_if_needed().ok();

    let final_status = if errors > 0 { RunStatus::Failed } else { RunStatus::Completed };

    if let Ok(Some(mut state)) = progress.load() {
        state.status = final_status;
        state.last_heartbeat = Utc::now();
        progress.save(&state)?;
    }

    emit(&WorkerMessage::Summary {
        transcripts: processed,
        memories: total_memories,
        errors,
        time: started.elapsed().as_secs_f64(),
    });

    Ok(final_status)
}

/// Run to completion, but race against SIGTERM/SIGINT. On signal, mark the progress state
/// `Cancelled` and return that status immediately rather than waiting for the in-flight
/// transcript to finish — the Supervisor gives the child a grace period before SIGKILL, and
/// writing Cancelled promptly is what lets `ccmem show` and a resumed run tell a clean
/// cancellation from a crash.
pub async fn run_with_signal_handling(config: &Config) -> Result<RunStatus, CcmemError> {
    let paths = Paths::new(config);
    let progress = ProgressTracker::new(paths.progress_state());

    let run_future = run(config);
    tokio::pin!(run_future);

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(CcmemError::Io)?;
        tokio::select! {
            result = &mut run_future => result,
            _ = sigterm.recv() => {
                mark_cancelled(&progress)?;
                Ok(RunStatus::Cancelled)
            }
            _ = tokio::signal::ctrl_c() => {
                mark_cancelled(&progress)?;
                Ok(RunStatus::Cancelled)
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = &mut run_future => result,
            _ = tokio::signal::ctrl_c() => {
                mark_cancelled(&progress)?;
                Ok(RunStatus::Cancelled)
            }
        }
    }
}

fn mark_cancelled(progress: &ProgressTracker) -> Result<(), CcmemError> {
    if let Ok(Some(mut state)) = progress.load() {
        state.status = RunStatus::Cancelled;
        state.last_heartbeat = Utc::now();
        progress.save(&state)?;
    }
    Ok(())
}

async fn process_one_transcript(
    config: &Config,
    _breaker: &CircuitBreaker,
    store: &MemoryStore,
    record: &crate::registry::TranscriptRecord,
    _progress: &ProgressTracker,
) -> Result<usize, CcmemError> {
    let ExtractionOutcome { memories, .. } = extract_transcript_with_progress(
        config,
        &record.session_id,
        &record.transcript_path,
        |ranges, coverage| {
            emit(&WorkerMessage::TriageComplete { session_id: &record.session_id, ranges, coverage });
        },
        |current, total| {
            let percent = if total == 0 { 100.0 } else { (current as f64 / total as f64) * 100.0 };
            emit(&WorkerMessage::ExtractionProgress {
                session_id: &record.session_id,
                messages_processed: current,
                messages_total: total,
                percent,
            });
        },
    )
    .await?;

    let count = memories.len();
    if count > 0 {
        store.add_batch(memories)?;
    }
    emit(&WorkerMessage::ExtractionComplete { session_id: &record.session_id, memories: count });
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_fails_when_uninitialized() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load();
        config.storage_dir = tmp.path().join("nope");
        let result = run(&config).await;
        assert!(matches!(result, Err(CcmemError::NotInitialized)));
    }

    #[tokio::test]
    async fn run_emits_no_work_when_registry_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load();
        config.storage_dir = tmp.path().join("ccmem");
        let paths = Paths::new(&config);
        paths.ensure_dirs().unwrap();
        let result = run(&config).await;
        assert!(result.is_ok());
    }
}
