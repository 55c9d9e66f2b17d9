//! Raw transcript entry shapes, as they appear in Claude Code's `.jsonl` transcript files.
//!
//! Generalizes wm's `transcript/types.rs` (not present in the retrieval pack; reconstructed
//! from its usage in `reader.rs`). Fields are deliberately permissive — transcripts are
//! produced by a system we don't control, so unknown shapes must deserialize as `Unknown`
//! rather than fail the whole read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, #[serde(default)] input: Value },
    Thinking { thinking: String },
    // `content` is defaulted, so this variant matches any JSON object; it must stay last
    // among the struct variants or it shadows `Thinking`/anything more specific.
    ToolResult { #[serde(default)] content: Value },
    Other(Value),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMessage {
    pub role: String,
    pub content: MessageContent,
}

/// A single line of a `.jsonl` transcript. Claude Code emits several record kinds on the
/// same stream (message turns, summaries, meta records, sidechain/subagent turns); we only
/// care about plain top-level user/assistant messages for extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub message: Option<RawMessage>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "isSidechain")]
    pub is_sidechain: bool,
    #[serde(default)]
    pub summary: Option<String>,
}

impl TranscriptEntry {
    pub fn is_message(&self) -> bool {
        matches!(self.entry_type.as_str(), "user" | "assistant") && self.message.is_some()
    }

    pub fn is_summary(&self) -> bool {
        self.entry_type == "summary"
    }

    pub fn is_meta_or_system(&self) -> bool {
        matches!(self.entry_type.as_str(), "system" | "meta")
    }

    pub fn role(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.role.as_str())
    }

    /// Flatten this entry's message content into plain text, eliding tool use/result
    /// payloads into short markers so the LLM sees structure without raw JSON noise.
    pub fn text(&self) -> Option<String> {
        let message = self.message.as_ref()?;
        match &message.content {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Blocks(blocks) => {
                let mut parts = Vec::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => parts.push(text.clone()),
                        ContentBlock::Thinking { thinking } => {
                            parts.push(format!("[thinking: {thinking}]"))
                        }
                        ContentBlock::ToolUse { name, .. } => parts.push(format!("[tool_use: {name}]")),
                        ContentBlock::ToolResult { .. } => parts.push("[tool_result]".to_string()),
                        ContentBlock::Other(_) => {}
                    }
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
        }
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }
}
