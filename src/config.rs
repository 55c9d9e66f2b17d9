//! Environment-variable configuration surface.
//!
//! Every tunable is read once at process start with a documented default. There is no
//! project-local config file layer; wm's `.wm/config.toml` per-operation toggle is
//! superseded by `MEMORY_SYSTEM_ENABLED` (see DESIGN.md for the dependency drop).

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_MEMORIES: usize = 1000;
const MIN_MAX_MEMORIES: usize = 10;
const MAX_MAX_MEMORIES: usize = 100_000;

const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EXTRACTION_MAX_MESSAGES: usize = 50;
const DEFAULT_EXTRACTION_MAX_CONTENT_LENGTH: usize = 500;
const DEFAULT_EXTRACTION_MAX_MEMORIES: usize = 10;
const DEFAULT_QUEUE_INTERVAL_SECS: u64 = 30;
const DEFAULT_TRIAGE_MAX_RANGES: usize = 5;
const DEFAULT_TRIAGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BREAKER_WINDOW_SECS: u64 = 60;
const DEFAULT_BREAKER_MAX_PER_WINDOW: u32 = 5;
const DEFAULT_RECENT_LIMIT: usize = 3;
const DEFAULT_RETRIEVAL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_VALIDATOR_MIN_LENGTH: usize = 50;
const DEFAULT_VALIDATOR_CONFIDENCE_THRESHOLD: f64 = 0.6;
const DEFAULT_VALIDATOR_MAX_WARNINGS: usize = 3;
const DEFAULT_STALE_THRESHOLD_SECS: u64 = 600;

/// Fully resolved runtime configuration, read once per process.
#[derive(Debug, Clone)]
pub struct Config {
    pub enabled: bool,
    pub storage_dir: PathBuf,
    pub max_memories: usize,
    pub extraction_model: String,
    pub extraction_timeout: Duration,
    pub extraction_max_messages: usize,
    pub extraction_max_content_length: usize,
    pub extraction_max_memories: usize,
    pub queue_interval: Duration,
    pub intelligent_sampling_enabled: bool,
    pub triage_max_ranges: usize,
    pub triage_timeout: Duration,
    pub breaker_window: Duration,
    pub breaker_max_per_window: u32,
    pub recent_limit: usize,
    pub retrieval_timeout: Duration,
    pub validator_min_length: usize,
    pub validator_confidence_threshold: f64,
    pub validator_max_warnings: usize,
    pub stale_threshold: Duration,
}

impl Config {
    /// Load configuration from the process environment, applying documented defaults.
    pub fn load() -> Self {
        Self {
            enabled: env_bool("MEMORY_SYSTEM_ENABLED", true),
            storage_dir: resolve_storage_dir(),
            max_memories: env_usize("MEMORY_MAX_MEMORIES", DEFAULT_MAX_MEMORIES)
                .clamp(MIN_MAX_MEMORIES, MAX_MAX_MEMORIES),
            extraction_model: std::env::var("MEMORY_EXTRACTION_MODEL")
                .unwrap_or_else(|_| "claude".to_string()),
            extraction_timeout: Duration::from_secs(env_u64(
                "MEMORY_EXTRACTION_TIMEOUT",
                DEFAULT_EXTRACTION_TIMEOUT_SECS,
            )),
            extraction_max_messages: env_usize(
                "MEMORY_EXTRACTION_MAX_MESSAGES",
                DEFAULT_EXTRACTION_MAX_MESSAGES,
            ),
            extraction_max_content_length: env_usize(
                "MEMORY_EXTRACTION_MAX_CONTENT_LENGTH",
                DEFAULT_EXTRACTION_MAX_CONTENT_LENGTH,
            ),
            extraction_max_memories: env_usize(
                "MEMORY_EXTRACTION_MAX_MEMORIES",
                DEFAULT_EXTRACTION_MAX_MEMORIES,
            ),
            queue_interval: Duration::from_secs(env_u64(
                "EXTRACTION_QUEUE_INTERVAL",
                DEFAULT_QUEUE_INTERVAL_SECS,
            )),
            intelligent_sampling_enabled: env_bool("INTELLIGENT_SAMPLING_ENABLED", true),
            triage_max_ranges: env_usize("TRIAGE_MAX_RANGES", DEFAULT_TRIAGE_MAX_RANGES),
            triage_timeout: Duration::from_secs(env_u64(
                "TRIAGE_TIMEOUT",
                DEFAULT_TRIAGE_TIMEOUT_SECS,
            )),
            breaker_window: Duration::from_secs(DEFAULT_BREAKER_WINDOW_SECS),
            breaker_max_per_window: DEFAULT_BREAKER_MAX_PER_WINDOW,
            recent_limit: DEFAULT_RECENT_LIMIT,
            retrieval_timeout: Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECS),
            validator_min_length: DEFAULT_VALIDATOR_MIN_LENGTH,
            validator_confidence_threshold: DEFAULT_VALIDATOR_CONFIDENCE_THRESHOLD,
            validator_max_warnings: DEFAULT_VALIDATOR_MAX_WARNINGS,
            stale_threshold: Duration::from_secs(DEFAULT_STALE_THRESHOLD_SECS),
        }
    }
}

/// Resolve `MEMORY_STORAGE_DIR` against `CLAUDE_PROJECT_DIR`, falling back to cwd.
/// Mirrors wm's `state::wm_dir` resolution rule, generalized from a fixed `.wm` name.
fn resolve_storage_dir() -> PathBuf {
    let configured = std::env::var("MEMORY_STORAGE_DIR").unwrap_or_else(|_| ".ccmem".to_string());
    let configured = PathBuf::from(configured);

    if configured.is_absolute() {
        return configured;
    }

    let root = std::env::var("CLAUDE_PROJECT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    root.join(configured)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | ""),
        Err(_) => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
