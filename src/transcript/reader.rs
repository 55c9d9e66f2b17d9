//! Transcript reading and message filtering.
//!
//! Grounded in wm's `transcript/reader.rs`: `read_transcript` skips malformed lines with
//! a warning instead of failing the whole read (transcripts are append-only logs written by
//! a process we don't control, and a single truncated trailing line is common), and
//! `format_context`'s USER/ASSISTANT-style rendering for LLM consumption.

use crate::transcript::types::TranscriptEntry;
use chrono::{DateTime, Utc};
use std::path::Path;

/// One filtered, role-normalized conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredMessage {
    pub role: String,
    pub text: String,
}

/// Read a `.jsonl` transcript file, skipping malformed lines. Never fails on a parse error
/// in an individual line; only fails if the file itself cannot be opened.
pub fn read_transcript(path: &Path) -> std::io::Result<Vec<TranscriptEntry>> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(path = %path.display(), lineno, %err, "skipping malformed transcript line");
            }
        }
    }
    Ok(entries)
}

/// Strip `<system-reminder>...</system-reminder>` blocks from user-turn text; these are
/// injected by the harness and are noise for extraction.
pub fn strip_system_reminders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        match rest.find("<system-reminder>") {
            Some(start) => {
                out.push_str(&rest[..start]);
                match rest[start..].find("</system-reminder>") {
                    Some(end_rel) => {
                        let end = start + end_rel + "</system-reminder>".len();
                        rest = &rest[end..];
                    }
                    None => {
                        rest = "";
                        break;
                    }
                }
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out.trim().to_string()
}

/// The Message Filter: normalize polymorphic transcript entries into an
/// ordered `{role, text}` list, dropping sidechain turns, system/meta records, and
/// summaries, and stripping system-reminder noise from surviving text.
pub fn filter_messages(entries: &[TranscriptEntry]) -> Vec<FilteredMessage> {
    entries
        .iter()
        .filter(|e| e.is_message() && !e.is_sidechain && !e.is_meta_or_system())
        .filter_map(|e| {
            let role = e.role()?.to_string();
            let text = e.text()?;
            let text = strip_system_reminders(&text);
            if text.is_empty() {
                return None;
            }
            Some(FilteredMessage { role, text })
        })
        .collect()
}

/// Messages whose transcript timestamp falls within `[since, until]`. Entries without a
/// parseable timestamp are excluded — extraction windows are a best-effort time slice, not
/// a complete-or-nothing contract.
pub fn get_messages_in_window(
    entries: &[TranscriptEntry],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<FilteredMessage> {
    let windowed: Vec<&TranscriptEntry> = entries
        .iter()
        .filter(|e| {
            e.timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| {
                    let t = t.with_timezone(&Utc);
                    t >= since && t <= until
                })
                .unwrap_or(false)
        })
        .collect();
    filter_messages(&windowed.into_iter().cloned().collect::<Vec<_>>())
}

/// Render filtered messages as labeled lines suitable for an LLM extraction prompt.
pub fn format_context(messages: &[FilteredMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.to_uppercase(), m.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn skips_malformed_lines() {
        let file = write_lines(&[
            r#"{"type":"user","message":{"role":"user","content":"hi"}}"#,
            "not json at all {{{",
            r#"{"type":"assistant","message":{"role":"assistant","content":"hello back"}}"#,
        ]);
        let entries = read_transcript(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn filter_drops_sidechain_and_meta() {
        let file = write_lines(&[
            r#"{"type":"user","message":{"role":"user","content":"keep me"}}"#,
            r#"{"type":"user","message":{"role":"user","content":"drop me"},"isSidechain":true}"#,
            r#"{"type":"system","message":{"role":"system","content":"drop me too"}}"#,
            r#"{"type":"summary","summary":"some summary"}"#,
        ]);
        let entries = read_transcript(file.path()).unwrap();
        let filtered = filter_messages(&entries);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].text, "keep me");
    }

    #[test]
    fn strips_system_reminder_blocks() {
        let text = "before <system-reminder>noise</system-reminder> after";
        assert_eq!(strip_system_reminders(text), "before after");
    }

    #[test]
    fn format_context_labels_roles() {
        let messages = vec![
            FilteredMessage { role: "user".into(), text: "hi".into() },
            FilteredMessage { role: "assistant".into(), text: "hello".into() },
        ];
        let rendered = format_context(&messages);
        assert!(rendered.contains("USER: hi"));
        assert!(rendered.contains("ASSISTANT: hello"));
    }
}
