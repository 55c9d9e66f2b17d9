//! Core data types for the Memory Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length, in bytes, a memory's `content` may have.
pub const MAX_CONTENT_LEN: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Learning,
    Decision,
    IssueSolved,
    Pattern,
    Preference,
    Context,
}

impl Category {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "learning" => Some(Self::Learning),
            "decision" => Some(Self::Decision),
            "issue_solved" | "issue-solved" | "issuesolved" => Some(Self::IssueSolved),
            "pattern" => Some(Self::Pattern),
            "preference" => Some(Self::Preference),
            "context" => Some(Self::Context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Sdk,
    Pattern,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub importance: f64,
    pub extraction_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_session_id: Option<String>,
}

impl MemoryMetadata {
    pub fn clamp_importance(&mut self) {
        self.importance = self.importance.clamp(0.0, 1.0);
    }
}

/// An immutable (after creation) extracted memory record.
///
/// Invariants: `id` is globally unique within the store; `importance` is clamped to
/// `[0, 1]`; `category` is drawn from the fixed enum; `content` is non-empty and bounded
/// by `MAX_CONTENT_LEN`. Nothing mutates after creation except `accessed_count` and
/// `last_accessed`, both touched only by retrieval bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub metadata: MemoryMetadata,
    #[serde(default)]
    pub accessed_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl Memory {
    /// Construct a new memory, clamping importance and truncating oversized content.
    /// Returns `None` if `content` is empty after trimming (an invalid memory).
    pub fn new(
        content: impl Into<String>,
        category: Category,
        mut metadata: MemoryMetadata,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let mut content = content.into().trim().to_string();
        if content.is_empty() {
            return None;
        }
        if content.len() > MAX_CONTENT_LEN {
            content.truncate(MAX_CONTENT_LEN);
        }
        metadata.clamp_importance();

        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            category,
            timestamp,
            metadata,
            accessed_count: 0,
            last_accessed: None,
        })
    }

    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.accessed_count += 1;
        self.last_accessed = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MemoryMetadata {
        MemoryMetadata {
            tags: BTreeSet::new(),
            importance: 0.5,
            extraction_method: ExtractionMethod::Sdk,
            source_session_id: None,
        }
    }

    #[test]
    fn rejects_empty_content() {
        assert!(Memory::new(" ", Category::Learning, meta(), Utc::now()).is_none());
    }

    #[test]
    fn clamps_importance_above_one() {
        let mut m = meta();
        m.importance = 5.0;
        let memory = Memory::new("x", Category::Learning, m, Utc::now()).unwrap();
        assert_eq!(memory.metadata.importance, 1.0);
    }

    #[test]
    fn clamps_importance_below_zero() {
        let mut m = meta();
        m.importance = -5.0;
        let memory = Memory::new("x", Category::Learning, m, Utc::now()).unwrap();
        assert_eq!(memory.metadata.importance, 0.0);
    }

    #[test]
    fn truncates_oversized_content() {
        let huge = "a".repeat(MAX_CONTENT_LEN + 100);
        let memory = Memory::new(huge, Category::Learning, meta(), Utc::now()).unwrap();
        assert_eq!(memory.content.len(), MAX_CONTENT_LEN);
    }

    #[test]
    fn category_from_str_lenient_handles_issue_solved_variants() {
        assert_eq!(Category::from_str_lenient("issue_solved"), Some(Category::IssueSolved));
        assert_eq!(Category::from_str_lenient("issue-solved"), Some(Category::IssueSolved));
        assert_eq!(Category::from_str_lenient("bogus"), None);
    }

    #[test]
    fn record_access_increments_and_stamps() {
        let mut memory = Memory::new("x", Category::Learning, meta(), Utc::now()).unwrap();
        assert_eq!(memory.accessed_count, 0);
        let t = Utc::now();
        memory.record_access(t);
        assert_eq!(memory.accessed_count, 1);
        assert_eq!(memory.last_accessed, Some(t));
    }
}
