//! Pass 1 of the two-pass extractor: ask the LLM which spans of the transcript
//! are worth a closer look, instead of running deep extraction over the whole session.
//!
//! Grounded in wm's `distill.rs::run_pass1`, which does per-session triage with a
//! file-size-keyed cache; this crate skips the cache (sessions are processed exactly once,
//! tracked by the Transcript Registry) but keeps the same "ask for ranges, fall back to the
//! tail on failure" shape.

use crate::error::ExtractError;
use crate::extractor::llm::{call_llm, extract_json_payload};
use crate::transcript::FilteredMessage;
use serde::Deserialize;
use std::time::Duration;

/// An inclusive `[start, end)` index range into a session's filtered message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    start: usize,
    end: usize,
}

const TRIAGE_SYSTEM_PROMPT: &str = "You triage coding-assistant conversation transcripts. \
Given numbered messages, return a JSON array of objects {\"start\": N, \"end\": N} (end \
exclusive) covering only the spans worth extracting durable memories from: decisions, \
learnings, resolved issues, stated preferences, and established patterns. Prefer few, \
tight ranges. Return [] if nothing is worth extracting. Respond with JSON only.";

/// Run triage over `messages`, returning up to `max_ranges` coalesced, sorted,
/// non-overlapping ranges. Falls back to a single range covering the last `fallback_tail`
/// messages on any failure (timeout, malformed output, missing credentials).
pub async fn triage(
    model: &str,
    messages: &[FilteredMessage],
    max_ranges: usize,
    timeout_duration: Duration,
    fallback_tail: usize,
    max_content_length: usize,
) -> Vec<MessageRange> {
    if messages.is_empty() {
        return Vec::new();
    }

    match run_triage_llm(model, messages, timeout_duration, max_content_length).await {
        Ok(ranges) => {
            let clamped = clamp_ranges(ranges, messages.len());
            let coalesced = coalesce(clamped);
            if coalesced.is_empty() {
                Vec::new()
            } else {
                truncate_ranges(coalesced, max_ranges)
            }
        }
        Err(_) => vec![fallback_range(messages.len(), fallback_tail)],
    }
}

/// Truncate `text` to `max_len` characters (not bytes) so multi-byte UTF-8 is never split.
fn truncate_chars(text: &str, max_len: usize) -> &str {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

async fn run_triage_llm(
    model: &str,
    messages: &[FilteredMessage],
    timeout_duration: Duration,
    max_content_length: usize,
) -> Result<Vec<MessageRange>, ExtractError> {
    let numbered = messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[{i}] {}: {}", m.role.to_uppercase(), truncate_chars(&m.text, max_content_length)))
        .collect::<Vec<_>>()
        .join("\n");

    let raw = call_llm(model, TRIAGE_SYSTEM_PROMPT, &numbered, timeout_duration).await?;
    let value = extract_json_payload(&raw)?;
    let raw_ranges: Vec<RawRange> =
        serde_json::from_value(value).map_err(|e| ExtractError::MalformedOutput(e.to_string()))?;

    Ok(raw_ranges
        .into_iter()
        .filter(|r| r.start < r.end)
        .map(|r| MessageRange { start: r.start, end: r.end })
        .collect())
}

fn clamp_ranges(ranges: Vec<MessageRange>, len: usize) -> Vec<MessageRange> {
    ranges
        .into_iter()
        .filter_map(|r| {
            let start = r.start.min(len);
            let end = r.end.min(len);
            if start < end {
                Some(MessageRange { start, end })
            } else {
                None
            }
        })
        .collect()
}

/// Sort and merge overlapping or adjacent ranges into the minimal covering set.
fn coalesce(mut ranges: Vec<MessageRange>) -> Vec<MessageRange> {
    if ranges.is_empty() {
        return ranges;
    }
    ranges.sort_by_key(|r| r.start);
    let mut merged = vec![ranges[0]];
    for range in ranges.into_iter().skip(1) {
        let last = merged.last_mut().unwrap();
        if range.start <= last.end {
            last.end = last.end.max(range.end);
        } else {
            merged.push(range);
        }
    }
    merged
}

fn truncate_ranges(mut ranges: Vec<MessageRange>, max_ranges: usize) -> Vec<MessageRange> {
    ranges.truncate(max_ranges);
    ranges
}

fn fallback_range(len: usize, fallback_tail: usize) -> MessageRange {
    let start = len.saturating_sub(fallback_tail);
    MessageRange { start, end: len }
}

/// The same tail-sampling fallback `triage` uses on failure, exposed for callers that skip
/// the LLM triage pass entirely (`INTELLIGENT_SAMPLING_ENABLED=false`).
pub fn tail_fallback(len: usize, fallback_tail: usize) -> MessageRange {
    fallback_range(len, fallback_tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_merges_overlapping_ranges() {
        let ranges = vec![
            MessageRange { start: 0, end: 5 },
            MessageRange { start: 3, end: 8 },
            MessageRange { start: 20, end: 25 },
        ];
        let merged = coalesce(ranges);
        assert_eq!(merged, vec![MessageRange { start: 0, end: 8 }, MessageRange { start: 20, end: 25 }]);
    }

    #[test]
    fn coalesce_merges_adjacent_ranges() {
        let ranges = vec![MessageRange { start: 0, end: 5 }, MessageRange { start: 5, end: 10 }];
        let merged = coalesce(ranges);
        assert_eq!(merged, vec![MessageRange { start: 0, end: 10 }]);
    }

    #[test]
    fn clamp_drops_out_of_bounds_and_empty_ranges() {
        let ranges = vec![
            MessageRange { start: 0, end: 5 },
            MessageRange { start: 10, end: 10 },
            MessageRange { start: 3, end: 100 },
        ];
        let clamped = clamp_ranges(ranges, 8);
        assert_eq!(clamped, vec![MessageRange { start: 0, end: 5 }, MessageRange { start: 3, end: 8 }]);
    }

    #[test]
    fn fallback_range_covers_tail() {
        assert_eq!(fallback_range(100, 50), MessageRange { start: 50, end: 100 });
        assert_eq!(fallback_range(10, 50), MessageRange { start: 0, end: 10 });
    }

    #[tokio::test]
    async fn triage_on_empty_messages_returns_empty() {
        let ranges = triage("claude", &[], 5, Duration::from_secs(1), 50, 500).await;
        assert!(ranges.is_empty());
    }

    #[tokio::test]
    async fn triage_falls_back_when_model_binary_missing() {
        let messages = vec![FilteredMessage { role: "user".into(), text: "hi".into() }];
        let ranges = triage(
            "ccmem-nonexistent-binary-xyz",
            &messages,
            5,
            Duration::from_secs(1),
            50,
            500,
        )
        .await;
        assert_eq!(ranges, vec![MessageRange { start: 0, end: 1 }]);
    }

    #[test]
    fn truncate_chars_bounds_to_char_count_not_bytes() {
        let text = "héllo wörld";
        let truncated = truncate_chars(text, 5);
        assert_eq!(truncated.chars().count(), 5);
        assert_eq!(truncate_chars("short", 50), "short");
    }
}
