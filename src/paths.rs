//! State file layout, relative to `Config::storage_dir`.
//!
//! Generalizes wm's `state::wm_path` helper from a single fixed file name to the five
//! independently-owned state files the pipeline coordinates through.

use crate::config::Config;
use std::path::PathBuf;

pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(config: &Config) -> Self {
        Self {
            base: config.storage_dir.clone(),
        }
    }

    pub fn base(&self) -> &PathBuf {
        &self.base
    }

    pub fn memories_dir(&self) -> PathBuf {
        self.base.join("memories")
    }

    pub fn memory_store(&self) -> PathBuf {
        self.memories_dir().join("memory.json")
    }

    pub fn progress_state(&self) -> PathBuf {
        self.memories_dir().join(".extraction_state.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.memories_dir().join("logs")
    }

    pub fn worker_log(&self, timestamp: &str) -> PathBuf {
        self.logs_dir().join(format!("extraction_worker_{timestamp}.log"))
    }

    pub fn processor_log(&self) -> PathBuf {
        self.logs_dir().join("processor.log")
    }

    pub fn supervisor_log(&self) -> PathBuf {
        self.logs_dir().join("supervisor.log")
    }

    pub fn transcript_registry(&self) -> PathBuf {
        self.base.join("transcripts.json")
    }

    pub fn extraction_queue(&self) -> PathBuf {
        self.base.join("extraction_queue.jsonl")
    }

    pub fn breaker_state(&self) -> PathBuf {
        self.base.join(".breaker_state.json")
    }

    /// Ensure every directory these paths live in exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.memories_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        if let Some(parent) = self.transcript_registry().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.base.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_dir(dir: PathBuf) -> Config {
        let mut cfg = Config::load();
        cfg.storage_dir = dir;
        cfg
    }

    #[test]
    fn layout_has_expected_paths() {
        let paths = Paths::new(&config_with_dir(PathBuf::from("/base")));
        assert_eq!(paths.memory_store(), PathBuf::from("/base/memories/memory.json"));
        assert_eq!(
            paths.progress_state(),
            PathBuf::from("/base/memories/.extraction_state.json")
        );
        assert_eq!(paths.transcript_registry(), PathBuf::from("/base/transcripts.json"));
        assert_eq!(paths.extraction_queue(), PathBuf::from("/base/extraction_queue.jsonl"));
        assert_eq!(paths.breaker_state(), PathBuf::from("/base/.breaker_state.json"));
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::new(&config_with_dir(tmp.path().to_path_buf()));
        paths.ensure_dirs().unwrap();
        assert!(paths.memories_dir().exists());
        assert!(paths.logs_dir().exists());
    }
}
