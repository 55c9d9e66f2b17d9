//! The Memory Store: a single bounded JSON document.
//!
//! Generalizes wm's `state.rs` whole-file read/modify/write pattern, with the
//! `lockfile`-backed atomic rename used throughout `extract.rs`/`compress.rs` to make
//! writes crash-safe, and an exclusive lock held for the duration of a read-modify-write
//! cycle so concurrent hook and processor invocations never race.

use crate::error::StoreError;
use crate::lockfile::{self, ExclusiveLock};
use crate::memory::types::Memory;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    created: chrono::DateTime<Utc>,
    last_updated: chrono::DateTime<Utc>,
    #[serde(default)]
    memories: Vec<Memory>,
}

impl StoreDocument {
    fn empty(now: chrono::DateTime<Utc>) -> Self {
        Self {
            version: 1,
            created: now,
            last_updated: now,
            memories: Vec::new(),
        }
    }
}

pub struct MemoryStore {
    path: PathBuf,
    max_memories: usize,
}

impl MemoryStore {
    pub fn new(path: PathBuf, max_memories: usize) -> Self {
        Self { path, max_memories }
    }

    fn load_unlocked(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::empty(Utc::now()));
        }
        let bytes = std::fs::read(&self.path).map_err(|source| StoreError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(StoreDocument::empty(Utc::now()));
        }
        let doc: StoreDocument = serde_json::from_slice(&bytes)?;
        Ok(doc)
    }

    fn save_unlocked(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        lockfile::atomic_write(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn lock(&self) -> Result<ExclusiveLock, StoreError> {
        ExclusiveLock::acquire(&self.path).map_err(|source| StoreError::Lock {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Append a single memory, rotating if the store now exceeds `max_memories`.
    pub fn add(&self, memory: Memory) -> Result<(), StoreError> {
        self.add_batch(vec![memory])
    }

    /// Append a batch of memories under one held lock, then rotate if needed.
    pub fn add_batch(&self, memories: Vec<Memory>) -> Result<(), StoreError> {
        if memories.is_empty() {
            return Ok(());
        }
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        doc.memories.extend(memories);
        doc.last_updated = Utc::now();
        rotate(&mut doc.memories, self.max_memories);
        self.save_unlocked(&doc)
    }

    /// Return every memory currently in the store, most-recently-added last.
    pub fn get_all(&self) -> Result<Vec<Memory>, StoreError> {
        let _guard = self.lock()?;
        Ok(self.load_unlocked()?.memories)
    }

    /// Return up to `limit` memories ordered by recency (timestamp descending). When
    /// `record_access` is set, bumps `accessed_count`/`last_accessed` on the returned
    /// memories and persists the bookkeeping before returning.
    pub fn search_recent(&self, limit: usize, record_access: bool) -> Result<Vec<Memory>, StoreError> {
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        doc.memories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let selected_ids: Vec<String> = doc.memories.iter().take(limit).map(|m| m.id.clone()).collect();

        if record_access {
            let now = Utc::now();
            for memory in doc.memories.iter_mut() {
                if selected_ids.contains(&memory.id) {
                    memory.record_access(now);
                }
            }
            self.save_unlocked(&doc)?;
        }

        Ok(doc
            .memories
            .into_iter()
            .filter(|m| selected_ids.contains(&m.id))
            .collect())
    }

    /// Trim the store to `max_memories` if it currently exceeds that bound.
    pub fn rotate_if_needed(&self) -> Result<usize, StoreError> {
        let _guard = self.lock()?;
        let mut doc = self.load_unlocked()?;
        let before = doc.memories.len();
        rotate(&mut doc.memories, self.max_memories);
        let dropped = before - doc.memories.len();
        if dropped > 0 {
            doc.last_updated = Utc::now();
            self.save_unlocked(&doc)?;
        }
        Ok(dropped)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load_unlocked()?.memories.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn purge(&self) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        self.save_unlocked(&StoreDocument::empty(Utc::now()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rank by `(accessed_count DESC, timestamp DESC)` and keep only the top `max`.
fn rotate(memories: &mut Vec<Memory>, max: usize) {
    if memories.len() <= max {
        return;
    }
    memories.sort_by(|a, b| {
        b.accessed_count
            .cmp(&a.accessed_count)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    memories.truncate(max);
}
