//! Shared two-pass extraction pipeline, used by both the Background Processor (H), which
//! runs it inline on the queue-drain interval, and the Extraction Worker (I), which runs it
//! from a supervised subprocess. Keeping the transcript-to-memories logic in one place
//! means the two execution modes can never drift in behavior, only in how they're invoked.

use crate::config::Config;
use crate::error::CcmemError;
use crate::extractor::{extract_from_ranges, tail_fallback, triage};
use crate::memory::{Memory, MemoryStore};
use crate::transcript::{filter_messages, read_transcript};
use tokio::time::timeout;

/// Result of running the pipeline over one transcript, including the triage bookkeeping
/// (the `triage_complete` event's `ranges` and `coverage = covered/total`).
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub memories: Vec<Memory>,
    pub ranges: usize,
    pub coverage: f64,
    pub memories_stored: usize,
}

/// Read, filter, triage, and deep-extract a single transcript, returning the memories it
/// produced plus triage coverage stats. Bounded end-to-end by `config.extraction_timeout`.
/// Equivalent to `extract_transcript_with_progress` with no-op callbacks.
pub async fn extract_transcript(config: &Config, session_id: &str, transcript_path: &str) -> Result<ExtractionOutcome, CcmemError> {
    extract_transcript_with_progress(config, session_id, transcript_path, |_, _| {}, |_, _| {}).await
}

/// As `extract_transcript`, but invokes `on_triage_done(ranges, coverage)` once triage has
/// selected its ranges (before any deep extraction runs), then `on_range_done(current,
/// total)` after each deep extraction range completes. A caller with a wire protocol to
/// maintain (the Extraction Worker) can use these to emit `triage_complete` ahead of any
/// `extraction_progress` event, matching the order the two passes actually run in.
pub async fn extract_transcript_with_progress(
    config: &Config,
    session_id: &str,
    transcript_path: &str,
    on_triage_done: impl FnOnce(usize, f64),
    on_range_done: impl FnMut(usize, usize),
) -> Result<ExtractionOutcome, CcmemError> {
    timeout(
        config.extraction_timeout,
        extract_transcript_inner(config, session_id, transcript_path, on_triage_done, on_range_done),
    )
    .await
    .map_err(|_| CcmemError::Other(format!("extraction timed out for session {session_id}")))?
}

async fn extract_transcript_inner(
    config: &Config,
    session_id: &str,
    transcript_path: &str,
    on_triage_done: impl FnOnce(usize, f64),
    on_range_done: impl FnMut(usize, usize),
) -> Result<ExtractionOutcome, CcmemError> {
    let entries = read_transcript(std::path::Path::new(transcript_path))?;
    let messages = filter_messages(&entries);
    if messages.is_empty() {
        on_triage_done(0, 0.0);
        return Ok(ExtractionOutcome::default());
    }

    // When intelligent sampling is disabled, skip the triage LLM call entirely and fall
    // straight to the same tail-sampling `triage` would use on failure.
    let ranges = if config.intelligent_sampling_enabled {
        triage(
            &config.extraction_model,
            &messages,
            config.triage_max_ranges,
            config.triage_timeout,
            config.extraction_max_messages,
            config.extraction_max_content_length,
        )
        .await
    } else {
        vec![tail_fallback(messages.len(), config.extraction_max_messages)]
    };

    let coverage = triage_coverage(&ranges, messages.len());
    on_triage_done(ranges.len(), coverage);

    if ranges.is_empty() {
        return Ok(ExtractionOutcome { memories: Vec::new(), ranges: 0, coverage, memories_stored: 0 });
    }

    let memories = extract_from_ranges(
        &config.extraction_model,
        &messages,
        &ranges,
        session_id,
        config.extraction_timeout,
        config.extraction_max_memories,
        on_range_done,
    )
    .await;

    Ok(ExtractionOutcome { memories, ranges: ranges.len(), coverage, memories_stored: 0 })
}

/// `covered_messages / total_messages`, clamped to `[0.0, 1.0]`; `0.0` when there were no
/// messages to begin with.
fn triage_coverage(ranges: &[crate::extractor::MessageRange], total_messages: usize) -> f64 {
    if total_messages == 0 {
        return 0.0;
    }
    let covered: usize = ranges.iter().map(|r| r.end.saturating_sub(r.start)).sum();
    (covered as f64 / total_messages as f64).clamp(0.0, 1.0)
}

/// Extract a transcript and persist its memories to `store`, returning the outcome (with the
/// in-memory `memories` field drained into `store`, left as an empty `Vec` on return).
pub async fn extract_and_store(
    config: &Config,
    store: &MemoryStore,
    session_id: &str,
    transcript_path: &str,
) -> Result<ExtractionOutcome, CcmemError> {
    let mut outcome = extract_transcript(config, session_id, transcript_path).await?;
    outcome.memories_stored = outcome.memories.len();
    if !outcome.memories.is_empty() {
        store.add_batch(std::mem::take(&mut outcome.memories))?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::MessageRange;

    #[test]
    fn coverage_is_zero_for_no_messages() {
        assert_eq!(triage_coverage(&[MessageRange { start: 0, end: 5 }], 0), 0.0);
    }

    #[test]
    fn coverage_is_ratio_of_covered_to_total() {
        let ranges = vec![MessageRange { start: 0, end: 3 }, MessageRange { start: 6, end: 8 }];
        assert_eq!(triage_coverage(&ranges, 10), 0.5);
    }

    #[test]
    fn coverage_is_zero_for_no_ranges() {
        assert_eq!(triage_coverage(&[], 10), 0.0);
    }

    #[tokio::test]
    async fn extract_transcript_on_missing_file_returns_err() {
        let mut config = Config::load();
        config.extraction_timeout = std::time::Duration::from_secs(5);
        let result = extract_transcript(&config, "s1", "/definitely/does/not/exist.jsonl").await;
        assert!(result.is_err());
    }
}
