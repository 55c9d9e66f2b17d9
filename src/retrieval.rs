//! Retrieval Interface: surfaces relevant memories at session start.
//!
//! New component grounded in the Memory Store's own `search_recent` plus a small
//! keyword-overlap scorer — vector/embedding search is an explicit non-goal, so relevance
//! is a deliberately simple bag-of-words overlap, matching the "no external services"
//! posture the rest of this crate holds to (no network calls, no extra daemons).

use crate::memory::Memory;
use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "to", "of", "in", "on", "for", "and", "or",
    "it", "this", "that", "with", "as", "at", "by", "be", "we", "i", "you",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn overlap_score(query_tokens: &HashSet<String>, memory: &Memory) -> usize {
    let memory_tokens = tokenize(&memory.content);
    query_tokens.intersection(&memory_tokens).count()
}

/// Retrieved memories, split into the keyword-relevant set and the always-included
/// most-recent set (deduped against each other).
pub struct RetrievalResult {
    pub relevant: Vec<Memory>,
    pub recent: Vec<Memory>,
}

/// Score `all_memories` against `query` and select the most relevant ones, plus the
/// `recent_limit` most recent memories not already selected.
pub fn retrieve(all_memories: Vec<Memory>, query: &str, recent_limit: usize, max_relevant: usize) -> RetrievalResult {
    let query_tokens = tokenize(query);

    let mut scored: Vec<(usize, Memory)> = all_memories
        .iter()
        .map(|m| (overlap_score(&query_tokens, m), m.clone()))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.timestamp.cmp(&a.1.timestamp)));

    let relevant: Vec<Memory> = scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .take(max_relevant)
        .map(|(_, m)| m)
        .collect();
    let relevant_ids: HashSet<&str> = relevant.iter().map(|m| m.id.as_str()).collect();

    let mut by_recency = all_memories;
    by_recency.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let recent = by_recency
        .into_iter()
        .filter(|m| !relevant_ids.contains(m.id.as_str()))
        .take(recent_limit)
        .collect();

    RetrievalResult { relevant, recent }
}

/// Render a retrieval result as the two-section markdown block surfaced to the assistant
/// at session start.
pub fn format_retrieval(result: &RetrievalResult) -> String {
    let mut out = String::new();
    if !result.relevant.is_empty() {
        out.push_str("## Relevant memories\n");
        for memory in &result.relevant {
            out.push_str(&format!("- {}\n", memory.content));
        }
    }
    if !result.recent.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## Recent memories\n");
        for memory in &result.recent {
            out.push_str(&format!("- {}\n", memory.content));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Category, ExtractionMethod, MemoryMetadata};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn memory(content: &str, timestamp: chrono::DateTime<Utc>) -> Memory {
        Memory::new(
            content,
            Category::Learning,
            MemoryMetadata {
                tags: BTreeSet::new(),
                importance: 0.5,
                extraction_method: ExtractionMethod::Sdk,
                source_session_id: None,
            },
            timestamp,
        )
        .unwrap()
    }

    #[test]
    fn relevant_memories_rank_by_overlap() {
        let t = Utc::now();
        let memories = vec![
            memory("uses postgres for storage", t),
            memory("prefers tabs over spaces", t),
            memory("storage backend is postgres with connection pooling", t),
        ];
        let result = retrieve(memories, "what storage backend does this use postgres", 0, 5);
        assert_eq!(result.relevant[0].content, "storage backend is postgres with connection pooling");
    }

    #[test]
    fn recent_excludes_already_relevant() {
        let t0 = Utc::now();
        let memories = vec![
            memory("uses postgres", t0),
            memory("unrelated note", t0 - chrono::Duration::hours(1)),
        ];
        let result = retrieve(memories, "postgres", 5, 5);
        assert_eq!(result.relevant.len(), 1);
        assert_eq!(result.recent.len(), 1);
        assert_eq!(result.recent[0].content, "unrelated note");
    }

    #[test]
    fn format_omits_empty_sections() {
        let result = RetrievalResult { relevant: vec![], recent: vec![] };
        assert_eq!(format_retrieval(&result), "");
    }
}
