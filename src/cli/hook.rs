//! `ccmem hook <event>`: stdin-JSON-in, stdout-JSON-or-nothing-out entry points
//! for each Claude Code hook event. Grounded in wm's `compile::run_hook` stdin/stdout shape.

use crate::config::Config;
use crate::error::CcmemError;
use crate::logging::log_hook;
use crate::paths::Paths;
use crate::router::{
    self, SessionStartInput, SessionStopInput, ToolCompletedInput,
};
use std::io::Read;

fn read_stdin_json<T: serde::de::DeserializeOwned + Default>() -> T {
    let mut buf = String::new();
    if std::io::stdin().read_to_string(&mut buf).is_err() || buf.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(&buf).unwrap_or_default()
}

fn emit_response(response: Option<router::HookResponse>) {
    if let Some(response) = response {
        if let Ok(json) = serde_json::to_string(&response) {
            println!("{json}");
        }
    }
}

impl Default for SessionStartInput {
    fn default() -> Self {
        Self { query: String::new() }
    }
}

impl Default for ToolCompletedInput {
    fn default() -> Self {
        Self { output_text: String::new() }
    }
}

pub fn session_start(config: &Config) -> Result<(), CcmemError> {
    let input: SessionStartInput = read_stdin_json();
    emit_response(router::handle_session_start(config, &input));
    Ok(())
}

pub fn session_stop(config: &Config) -> Result<(), CcmemError> {
    let mut buf = String::new();
    let _ = std::io::stdin().read_to_string(&mut buf);
    let input: Result<SessionStopInput, _> = serde_json::from_str(&buf);

    let Ok(input) = input else {
        // Missing session_id/transcript_path is a malformed hook payload, not extraction
        // work to retry — log and exit silently rather than crash the hook.
        let paths = Paths::new(config);
        log_hook(&paths.memories_dir(), "session_stop", "malformed hook input, ignoring");
        return Ok(());
    };

    emit_response(router::handle_session_stop(config, &input));
    Ok(())
}

pub fn subagent_session_stop(_config: &Config) -> Result<(), CcmemError> {
    emit_response(router::handle_subagent_session_stop());
    Ok(())
}

pub fn tool_completed(config: &Config) -> Result<(), CcmemError> {
    let input: ToolCompletedInput = read_stdin_json();
    emit_response(router::handle_tool_completed(config, &input));
    Ok(())
}

pub fn pre_compaction(_config: &Config) -> Result<(), CcmemError> {
    emit_response(router::handle_pre_compaction());
    Ok(())
}
