//! Pass 2 of the two-pass extractor: run a focused extraction LLM call over
//! each triaged range and turn its output into `Memory` candidates.
//!
//! Grounded in wm's `distill.rs::run_pass2`/`call_categorization_llm`, generalized from
//! marker-delimited bullet parsing into JSON-array parsing now that the triage pass already
//! narrowed the input, and because downstream components (Memory Store rotation, Retrieval
//! scoring) need structured fields rather than free text.

use crate::error::ExtractError;
use crate::extractor::llm::{call_llm, extract_json_payload};
use crate::extractor::triage::MessageRange;
use crate::memory::{Category, ExtractionMethod, Memory, MemoryMetadata};
use crate::transcript::{format_context, FilteredMessage};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    content: String,
    category: String,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    tags: Vec<String>,
}

const DEEP_SYSTEM_PROMPT: &str = "You extract durable memories from a slice of a coding \
assistant transcript. Return a JSON array of objects {\"content\": string, \"category\": \
one of learning|decision|issue_solved|pattern|preference|context, \"importance\": number \
0-1 (optional), \"tags\": array of strings (optional)}. Only include memories a developer \
would want recalled in a future session. Return [] if none qualify. Respond with JSON only.";

/// Run deep extraction over each range in `ranges`, capping the total number of memories
/// produced at `max_memories`. A range that fails (timeout, malformed output, no
/// credentials) is skipped rather than aborting the whole session's extraction.
///
/// `on_range_done(messages_processed, messages_total)` fires after each range, counted in
/// message spans rather than range indices, matching the worker's `extraction_progress`
/// wire event.
pub async fn extract_from_ranges(
    model: &str,
    messages: &[FilteredMessage],
    ranges: &[MessageRange],
    session_id: &str,
    timeout_duration: Duration,
    max_memories: usize,
    mut on_range_done: impl FnMut(usize, usize),
) -> Vec<Memory> {
    let mut memories = Vec::new();
    let messages_total: usize = ranges.iter().map(|r| r.end.saturating_sub(r.start)).sum();
    let mut messages_processed = 0usize;

    for range in ranges {
        if memories.len() >= max_memories {
            break;
        }
        let slice = &messages[range.start..range.end];
        if !slice.is_empty() {
            match extract_one_range(model, slice, session_id, timeout_duration).await {
                Ok(candidates) => {
                    for memory in candidates {
                        if memories.len() >= max_memories {
                            break;
                        }
                        memories.push(memory);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, session_id, "deep extraction failed for range, skipping");
                }
            }
        }
        messages_processed += slice.len();
        on_range_done(messages_processed, messages_total);
    }

    memories
}

async fn extract_one_range(
    model: &str,
    messages: &[FilteredMessage],
    session_id: &str,
    timeout_duration: Duration,
) -> Result<Vec<Memory>, ExtractError> {
    let context = format_context(messages);
    let raw = call_llm(model, DEEP_SYSTEM_PROMPT, &context, timeout_duration).await?;
    let value = extract_json_payload(&raw)?;
    let raw_candidates: Vec<RawCandidate> =
        serde_json::from_value(value).map_err(|e| ExtractError::MalformedOutput(e.to_string()))?;

    let now = Utc::now();
    let memories = raw_candidates
        .into_iter()
        .filter_map(|c| {
            let category = Category::from_str_lenient(&c.category)?;
            let metadata = MemoryMetadata {
                tags: c.tags.into_iter().collect::<BTreeSet<_>>(),
                importance: c.importance.unwrap_or(0.5),
                extraction_method: ExtractionMethod::Sdk,
                source_session_id: Some(session_id.to_string()),
            };
            Memory::new(c.content, category, metadata, now)
        })
        .collect();

    Ok(memories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_failed_ranges_without_aborting() {
        let messages = vec![FilteredMessage { role: "user".into(), text: "did a thing".into() }];
        let ranges = vec![MessageRange { start: 0, end: 1 }];
        let memories = extract_from_ranges(
            "ccmem-nonexistent-binary-xyz",
            &messages,
            &ranges,
            "s1",
            Duration::from_secs(1),
            10,
            |_, _| {},
        )
        .await;
        assert!(memories.is_empty());
    }

    #[tokio::test]
    async fn empty_ranges_produce_no_memories() {
        let messages = vec![FilteredMessage { role: "user".into(), text: "hi".into() }];
        let memories =
            extract_from_ranges("claude", &messages, &[], "s1", Duration::from_secs(1), 10, |_, _| {}).await;
        assert!(memories.is_empty());
    }

    #[tokio::test]
    async fn reports_progress_per_range() {
        let messages = vec![FilteredMessage { role: "user".into(), text: "hi".into() }];
        let ranges = vec![MessageRange { start: 0, end: 1 }];
        let mut calls = Vec::new();
        let _ = extract_from_ranges(
            "ccmem-nonexistent-binary-xyz",
            &messages,
            &ranges,
            "s1",
            Duration::from_secs(1),
            10,
            |current, total| calls.push((current, total)),
        )
        .await;
        assert_eq!(calls, vec![(1, 1)]);
    }
}
