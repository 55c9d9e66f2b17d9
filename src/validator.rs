//! Claim Validator: flags assistant claims that contradict stored
//! memories, e.g. re-proposing an approach already rejected as a documented preference.
//!
//! New component; sentence segmentation is grounded in wm's general approach of simple,
//! dependency-light text processing (no NLP crate in its own dependency stack), so this uses
//! `regex` for claim boundaries rather than pulling in a sentence-tokenizer crate.

use crate::memory::Memory;
use regex::Regex;
use std::sync::OnceLock;

fn sentence_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)[^.!?\n]+[.!?]?").unwrap())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub claim: String,
    pub contradicts: bool,
    pub confidence: f64,
    pub supporting_memory: Option<String>,
}

/// Split `text` into candidate claims (trimmed, non-empty sentences).
pub fn extract_claims(text: &str) -> Vec<String> {
    sentence_splitter()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Tokens shared between a claim and a memory's content, as a crude contradiction signal:
/// a claim that shares most of its words with a stored preference/decision but differs in
/// at least one polarity-bearing word ("use" vs "avoid", "should" vs "should not") is a
/// candidate contradiction.
const NEGATORS: &[&str] = &["not", "avoid", "never", "don't", "shouldn't", "stop"];

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn has_negator(tokens: &[String]) -> bool {
    tokens.iter().any(|t| NEGATORS.contains(&t.as_str()))
}

fn overlap_ratio(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let shared = a.iter().filter(|t| set_b.contains(t)).count();
    shared as f64 / a.len().max(b.len()) as f64
}

/// Validate `text` against `memories`, returning only claims judged likely to contradict a
/// stored memory above `confidence_threshold`, capped at `max_warnings`.
pub fn validate_text(
    text: &str,
    memories: &[Memory],
    confidence_threshold: f64,
    min_length: usize,
    max_warnings: usize,
) -> Vec<Warning> {
    if text.trim().len() < min_length {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    for claim in extract_claims(text) {
        let claim_tokens = tokenize(&claim);
        let claim_negated = has_negator(&claim_tokens);

        let mut best: Option<(f64, &Memory)> = None;
        for memory in memories {
            let memory_tokens = tokenize(&memory.content);
            let ratio = overlap_ratio(&claim_tokens, &memory_tokens);
            if ratio <= 0.0 {
                continue;
            }
            let memory_negated = has_negator(&memory_tokens);
            if claim_negated == memory_negated {
                continue;
            }
            if best.map(|(s, _)| ratio > s).unwrap_or(true) {
                best = Some((ratio, memory));
            }
        }

        if let Some((confidence, memory)) = best {
            if confidence > confidence_threshold {
                warnings.push(Warning {
                    claim,
                    contradicts: true,
                    confidence,
                    supporting_memory: Some(memory.id.clone()),
                });
                if warnings.len() >= max_warnings {
                    break;
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Category, ExtractionMethod, MemoryMetadata};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn memory(content: &str) -> Memory {
        Memory::new(
            content,
            Category::Preference,
            MemoryMetadata {
                tags: BTreeSet::new(),
                importance: 0.5,
                extraction_method: ExtractionMethod::Sdk,
                source_session_id: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn extract_claims_splits_on_sentence_boundaries() {
        let claims = extract_claims("First sentence. Second sentence! Third?");
        assert_eq!(claims.len(), 3);
    }

    #[test]
    fn below_min_length_produces_no_warnings() {
        let memories = vec![memory("never use global mutable state in this codebase")];
        let warnings = validate_text("short", &memories, 0.5, 50, 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn flags_contradicting_claim_above_threshold() {
        let memories = vec![memory(
            "the team decided to never use global mutable state in this codebase for testability",
        )];
        let text = "Let's use global mutable state in this codebase for testability since it's simpler here.";
        let warnings = validate_text(text, &memories, 0.3, 10, 3);
        assert!(!warnings.is_empty());
        assert!(warnings[0].contradicts);
    }

    #[test]
    fn caps_at_max_warnings() {
        let memories = vec![memory("never use global mutable state anywhere in this service at all")];
        let text = "Use global mutable state here. Use global mutable state there too. \
            Use global mutable state everywhere honestly in this service at all.";
        let warnings = validate_text(text, &memories, 0.1, 10, 1);
        assert_eq!(warnings.len(), 1);
    }
}
