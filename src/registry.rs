//! Transcript Registry: tracks which transcripts have been queued and
//! processed so the pipeline never double-extracts a session.
//!
//! Grounded in wm's `distill.rs` per-session `SessionExtraction` cache keyed by session id,
//! generalized here into an append-mostly registry with an idempotent insert.

use crate::error::RegistryError;
use crate::lockfile::{self, ExclusiveLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub session_id: String,
    pub transcript_path: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub memories_extracted: usize,
    /// Records the last extraction failure for this transcript, if any. A transcript is
    /// still marked `processed` on permanent failure so the registry never retries it
    /// forever; this field is the only trace of why.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptRecord {
    fn new(session_id: String, transcript_path: String) -> Self {
        Self {
            session_id,
            transcript_path,
            created_at: Utc::now(),
            processed: false,
            processed_at: None,
            memories_extracted: 0,
            error: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    records: Vec<TranscriptRecord>,
}

pub struct TranscriptRegistry {
    path: PathBuf,
}

impl TranscriptRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_unlocked(&self) -> Result<RegistryDocument, RegistryError> {
        if !self.path.exists() {
            return Ok(RegistryDocument::default());
        }
        let bytes = std::fs::read(&self.path).map_err(|source| RegistryError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(RegistryDocument::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_unlocked(&self, doc: &RegistryDocument) -> Result<(), RegistryError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        lockfile::atomic_write(&self.path, &bytes).map_err(|source| RegistryError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn lock(&self) -> Result<ExclusiveLock, RegistryError> {
        ExclusiveLock::acquire(&self.path).map_err(|source| RegistryError::Lock {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Insert a new record for `session_id`/`transcript_path`. A no-op if the session is
    /// already registered, so the Hook Router can call this unconditionally on every stop.
    pub fn add_transcript_record(
        &self,
        session_id: &str,
        transcript_path: &str,
    ) -> Result<bool, RegistryError> {
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        if doc.records.iter().any(|r| r.session_id == session_id) {
            return Ok(false);
        }
        doc.records
            .push(TranscriptRecord::new(session_id.to_string(), transcript_path.to_string()));
        self.save_unlocked(&doc)?;
        Ok(true)
    }

    pub fn mark_transcript_processed(
        &self,
        session_id: &str,
        memories_extracted: usize,
        error: Option<String>,
    ) -> Result<(), RegistryError> {
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        if let Some(record) = doc.records.iter_mut().find(|r| r.session_id == session_id) {
            record.processed = true;
            record.processed_at = Some(Utc::now());
            record.memories_extracted = memories_extracted;
            record.error = error;
        }
        self.save_unlocked(&doc)
    }

    /// Unprocessed records, oldest first.
    pub fn get_unprocessed(&self) -> Result<Vec<TranscriptRecord>, RegistryError> {
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        doc.records.retain(|r| !r.processed);
        doc.records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(doc.records)
    }

    pub fn get(&self, session_id: &str) -> Result<Option<TranscriptRecord>, RegistryError> {
        let _guard = self.lock()?;
        let doc = self.load_unlocked()?;
        Ok(doc.records.into_iter().find(|r| r.session_id == session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = TranscriptRegistry::new(tmp.path().join("transcripts.json"));
        assert!(registry.add_transcript_record("s1", "/path/a.jsonl").unwrap());
        assert!(!registry.add_transcript_record("s1", "/path/a.jsonl").unwrap());
        assert_eq!(registry.get_unprocessed().unwrap().len(), 1);
    }

    #[test]
    fn mark_processed_updates_record() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = TranscriptRegistry::new(tmp.path().join("transcripts.json"));
        registry.add_transcript_record("s1", "/path/a.jsonl").unwrap();
        registry.mark_transcript_processed("s1", 3, None).unwrap();
        let record = registry.get("s1").unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.memories_extracted, 3);
        assert!(registry.get_unprocessed().unwrap().is_empty());
    }

    #[test]
    fn mark_processed_with_error_still_marks_processed() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = TranscriptRegistry::new(tmp.path().join("transcripts.json"));
        registry.add_transcript_record("s1", "/path/a.jsonl").unwrap();
        registry
            .mark_transcript_processed("s1", 0, Some("llm timeout".to_string()))
            .unwrap();
        let record = registry.get("s1").unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.error.as_deref(), Some("llm timeout"));
    }

    #[test]
    fn get_unprocessed_orders_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = TranscriptRegistry::new(tmp.path().join("transcripts.json"));
        registry.add_transcript_record("s1", "/a").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.add_transcript_record("s2", "/b").unwrap();
        let unprocessed = registry.get_unprocessed().unwrap();
        assert_eq!(unprocessed[0].session_id, "s1");
        assert_eq!(unprocessed[1].session_id, "s2");
    }
}
