//! LLM subprocess client.
//!
//! Generalizes wm's `llm.rs`: same `claude -p --output-format json` invocation shape and
//! `EnvGuard` recursion guard, but the two-pass extractor needs structured candidates
//! rather than a single marker-delimited text block, so the prompt asks for a JSON array
//! and the response is parsed as such instead of with `parse_marker_response`.

use crate::error::ExtractError;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Restores environment variables on drop. Grounded in wm's `llm::EnvGuard`: extraction
/// shells out to `claude`, which would itself run hooks and re-enter extraction unless the
/// disable flag is set for the duration of the subprocess call.
pub struct EnvGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let previous = std::env::var(key).ok();
        unsafe { std::env::set_var(key, value) };
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(v) => unsafe { std::env::set_var(self.key, v) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

/// Invoke the configured model as a subprocess with `system_prompt` and `message`,
/// returning its raw stdout. Bounded by `timeout_duration`; credentials are assumed to be
/// available via the ambient `claude` CLI auth and are not managed by this crate.
pub async fn call_llm(
    model: &str,
    system_prompt: &str,
    message: &str,
    timeout_duration: Duration,
) -> Result<String, ExtractError> {
    let _guard = EnvGuard::set("MEMORY_SYSTEM_ENABLED", "false");

    let mut command = Command::new(model);
    command
        .arg("-p")
        .arg("--output-format")
        .arg("json")
        .arg("--no-session-persistence")
        .arg("--system-prompt")
        .arg(system_prompt)
        .arg(message)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let child = command.spawn().map_err(ExtractError::Spawn)?;

    let output = timeout(timeout_duration, child.wait_with_output())
        .await
        .map_err(|_| ExtractError::Timeout(timeout_duration))?
        .map_err(ExtractError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_ascii_lowercase().contains("not logged in") || stderr.to_ascii_lowercase().contains("credentials") {
            return Err(ExtractError::NoCredentials);
        }
        return Err(ExtractError::NonZeroExit(stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);

    // `claude -p --output-format json` wraps the actual response in a CLI envelope
    // ({"type":"result","result":"...",...}); unwrap it before returning to callers that
    // parse the inner content as JSON themselves.
    let envelope: serde_json::Value = serde_json::from_str(&stdout)
        .map_err(|err| ExtractError::MalformedOutput(err.to_string()))?;

    envelope
        .get("result")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ExtractError::MalformedOutput("claude CLI response missing 'result' field".to_string()))
}

/// Extract the first top-level JSON array or object embedded in an LLM response, tolerant
/// of a surrounding markdown code fence (````json ... ````) the way wm's
/// `parse_marker_response` tolerates a leading "Response:" prefix.
pub fn extract_json_payload(raw: &str) -> Result<serde_json::Value, ExtractError> {
    let trimmed = raw.trim();
    let candidate = if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
        match after_fence.find("```") {
            Some(end) => after_fence[..end].trim(),
            None => after_fence.trim(),
        }
    } else {
        trimmed
    };

    serde_json::from_str(candidate).map_err(|err| ExtractError::MalformedOutput(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_json() {
        let value = extract_json_payload(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extracts_json_from_markdown_fence() {
        let raw = "```json\n[{\"a\": 1}]\n```";
        let value = extract_json_payload(raw).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(extract_json_payload("not json").is_err());
    }

    #[test]
    fn env_guard_restores_previous_value() {
        unsafe { std::env::set_var("CCMEM_TEST_GUARD", "before") };
        {
            let _guard = EnvGuard::set("CCMEM_TEST_GUARD", "during");
            assert_eq!(std::env::var("CCMEM_TEST_GUARD").unwrap(), "during");
        }
        assert_eq!(std::env::var("CCMEM_TEST_GUARD").unwrap(), "before");
        unsafe { std::env::remove_var("CCMEM_TEST_GUARD") };
    }
}
