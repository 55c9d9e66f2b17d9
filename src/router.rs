//! Hook Router: the single entry point every Claude Code hook invocation
//! passes through. Must stay fast and side-effect-light — no LLM calls, no subprocess
//! spawns, no Memory Store writes. Heavy lifting is deferred to the queue/processor.
//!
//! Grounded in wm's `compile::run_hook`/`extract::run_hook`: read stdin JSON, do the
//! minimal synchronous work, emit a `HookResponse` (or nothing) on stdout, and never
//! propagate an error that would surface as a visible failure to the assistant session.

use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::memory::MemoryStore;
use crate::paths::Paths;
use crate::queue::ExtractionQueue;
use crate::registry::TranscriptRegistry;
use crate::retrieval::{format_retrieval, retrieve};
use crate::validator::validate_text;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SessionStartInput {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionStopInput {
    pub session_id: String,
    pub transcript_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolCompletedInput {
    #[serde(default)]
    pub output_text: String,
}

#[derive(Debug, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HookResponse {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
}

/// `session_start`: run Retrieval and surface relevant/recent memories as additional
/// context. Returns `None` (silent success) if the feature is disabled or uninitialized.
pub fn handle_session_start(config: &Config, input: &SessionStartInput) -> Option<HookResponse> {
    if !config.enabled {
        return None;
    }
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        return None;
    }

    let store = MemoryStore::new(paths.memory_store(), config.max_memories);
    let all = store.get_all().ok()?;
    if all.is_empty() {
        return None;
    }

    let result = retrieve(all, &input.query, config.recent_limit, config.extraction_max_memories);
    let rendered = format_retrieval(&result);
    if rendered.is_empty() {
        return None;
    }

    Some(HookResponse {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "SessionStart".to_string(),
            additional_context: Some(rendered),
        },
    })
}

/// `session_stop`: the hot path. Circuit-breaker check, idempotent registry insert, queue
/// enqueue. Deliberately does no transcript reading or LLM work — must return in low
/// single-digit milliseconds on the common path.
pub fn handle_session_stop(config: &Config, input: &SessionStopInput) -> Option<HookResponse> {
    if !config.enabled {
        return None;
    }
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        return None;
    }

    let breaker = CircuitBreaker::new(paths.breaker_state(), config.breaker_window, config.breaker_max_per_window);
    match breaker.allow(Utc::now()) {
        Ok(true) => {}
        Ok(false) | Err(_) => return None,
    }

    let registry = TranscriptRegistry::new(paths.transcript_registry());
    if registry
        .add_transcript_record(&input.session_id, &input.transcript_path)
        .unwrap_or(false)
    {
        let queue = ExtractionQueue::new(paths.extraction_queue());
        let _ = queue.enqueue(&input.session_id, &input.transcript_path);
    }

    None
}

/// `subagent_session_stop`: explicit no-op. Subagent transcripts are sidechain data the
/// Message Filter already drops; there's nothing useful to enqueue.
pub fn handle_subagent_session_stop() -> Option<HookResponse> {
    None
}

/// `tool_completed`: run the Claim Validator over the tool's output text.
pub fn handle_tool_completed(config: &Config, input: &ToolCompletedInput) -> Option<HookResponse> {
    if !config.enabled {
        return None;
    }
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        return None;
    }

    let store = MemoryStore::new(paths.memory_store(), config.max_memories);
    let memories = store.get_all().ok()?;
    if memories.is_empty() {
        return None;
    }

    let warnings = validate_text(
        &input.output_text,
        &memories,
        config.validator_confidence_threshold,
        config.validator_min_length,
        config.validator_max_warnings,
    );
    if warnings.is_empty() {
        return None;
    }

    let rendered = warnings
        .iter()
        .map(|w| format!("- possible contradiction: \"{}\"", w.claim))
        .collect::<Vec<_>>()
        .join("\n");

    Some(HookResponse {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "ToolCompleted".to_string(),
            additional_context: Some(rendered),
        },
    })
}

/// `pre_compaction`: out of scope for this pipeline; always a no-op.
pub fn handle_pre_compaction() -> Option<HookResponse> {
    None
}
