//! Background Processor: drains the Extraction Queue on a fixed
//! interval and runs extraction inline, in-process, sequentially.
//!
//! Grounded in `opencode-mem`'s `start_background_processor`: a `tokio::spawn`ed loop with
//! `tokio::time::interval`, periodic work gated by the tick rather than per-message
//! signaling. Unlike the queue processor's concurrent `semaphore`-bounded workers, this
//! processor runs strictly sequentially — it must never itself spawn subprocesses
//! or compete with a supervised worker run for the same transcripts.

use crate::config::Config;
use crate::error::CcmemError;
use crate::memory::MemoryStore;
use crate::paths::Paths;
use crate::pipeline::extract_and_store;
use crate::queue::ExtractionQueue;
use crate::registry::TranscriptRegistry;
use tokio::time::interval;

/// Run the processor loop forever, draining the queue every `config.queue_interval`.
/// Intended to be run as `ccmem processor run`, a long-lived companion process.
pub async fn run_forever(config: &Config) -> Result<(), CcmemError> {
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        return Err(CcmemError::NotInitialized);
    }
    paths.ensure_dirs()?;

    let queue = ExtractionQueue::new(paths.extraction_queue());
    let registry = TranscriptRegistry::new(paths.transcript_registry());
    let store = MemoryStore::new(paths.memory_store(), config.max_memories);

    let mut ticker = interval(config.queue_interval);
    loop {
        ticker.tick().await;
        if let Err(err) = drain_once(config, &queue, &registry, &store).await {
            tracing::error!(%err, "background processor drain failed");
        }
    }
}

/// Drain and process every job currently queued, once. Exposed separately from
/// `run_forever` so tests (and a future `ccmem processor drain-once`) don't need a live
/// ticker.
pub async fn drain_once(
    config: &Config,
    queue: &ExtractionQueue,
    registry: &TranscriptRegistry,
    store: &MemoryStore,
) -> Result<usize, CcmemError> {
    let jobs = queue.drain()?;
    let mut processed = 0;

    for job in jobs {
        // Idempotency gate: a transcript may already have been picked up by a supervised
        // worker run between enqueue and this drain.
        if let Some(record) = registry.get(&job.session_id)? {
            if record.processed {
                continue;
            }
        } else {
            registry.add_transcript_record(&job.session_id, &job.transcript_path)?;
        }

        match extract_and_store(config, store, &job.session_id, &job.transcript_path).await {
            Ok(outcome) => {
                registry.mark_transcript_processed(&job.session_id, outcome.memories_stored, None)?;
                processed += 1;
            }
            Err(err) => {
                tracing::warn!(session_id = %job.session_id, %err, "extraction failed for queued job");
                registry.mark_transcript_processed(&job.session_id, 0, Some(err.to_string()))?;
            }
        }
    }

    if processed > 0 {
        store.rotate_if_needed()?;
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: std::path::PathBuf) -> Config {
        let mut cfg = Config::load();
        cfg.storage_dir = dir;
        cfg
    }

    #[tokio::test]
    async fn drain_once_skips_already_processed_jobs() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path().join("ccmem"));
        let paths = Paths::new(&cfg);
        paths.ensure_dirs().unwrap();

        let queue = ExtractionQueue::new(paths.extraction_queue());
        let registry = TranscriptRegistry::new(paths.transcript_registry());
        let store = MemoryStore::new(paths.memory_store(), cfg.max_memories);

        registry.add_transcript_record("s1", "/nonexistent.jsonl").unwrap();
        registry.mark_transcript_processed("s1", 2, None).unwrap();
        queue.enqueue("s1", "/nonexistent.jsonl").unwrap();

        let processed = drain_once(&cfg, &queue, &registry, &store).await.unwrap();
        assert_eq!(processed, 0);
    }

    #[tokio::test]
    async fn drain_once_records_extraction_failure_without_aborting() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path().join("ccmem"));
        let paths = Paths::new(&cfg);
        paths.ensure_dirs().unwrap();

        let queue = ExtractionQueue::new(paths.extraction_queue());
        let registry = TranscriptRegistry::new(paths.transcript_registry());
        let store = MemoryStore::new(paths.memory_store(), cfg.max_memories);

        queue.enqueue("s1", "/definitely/does/not/exist.jsonl").unwrap();
        let result = drain_once(&cfg, &queue, &registry, &store).await;
        assert!(result.is_ok());
        let record = registry.get("s1").unwrap().unwrap();
        assert!(record.processed);
        assert!(record.error.is_some());
    }
}
