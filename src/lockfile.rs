//! Advisory file locking and atomic-replace helpers shared by every on-disk state file.
//!
//! Locking is grounded in `oj-daemon::lifecycle::startup_inner`'s use of
//! `fs2::FileExt::try_lock_exclusive` on its daemon lock file. Atomic replace is grounded
//! in wm's `extract.rs`/`compress.rs`, which write to a `.tmp` path and `rename` it over
//! the target to avoid partial writes under concurrent session access.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Holds an exclusive lock on `path` for the lifetime of the guard.
pub struct ExclusiveLock {
    _file: File,
}

impl ExclusiveLock {
    /// Block until the exclusive lock on `path` is acquired.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).truncate(false).open(path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

/// Holds a shared (read) lock on `path` for the lifetime of the guard.
pub struct SharedLock {
    _file: File,
}

impl SharedLock {
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).read(true).write(true).open(path)?;
        file.lock_shared()?;
        Ok(Self { _file: file })
    }
}

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file, fsync, then
/// rename over the target. Caller is expected to hold the relevant exclusive lock.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });

    {
        let mut file = File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append `line` (with a trailing newline) to `path`, flushed and fsynced, under a shared
/// append lock so multiple producers never interleave partial lines.
pub fn append_line_locked(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    use std::io::Write;
    let result = (|| {
        file.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;
        file.sync_data()
    })();
    FileExt::unlock(&file)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        atomic_write(&path, b"{\"a\":1}").unwrap();
        atomic_write(&path, b"{\"a\":2}").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"a\":2}");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn append_line_locked_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.jsonl");
        append_line_locked(&path, "one").unwrap();
        append_line_locked(&path, "two").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "one\ntwo\n");
    }

    #[test]
    fn exclusive_lock_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".lock");
        let guard = ExclusiveLock::acquire(&path).unwrap();
        drop(guard);
        let _guard2 = ExclusiveLock::acquire(&path).unwrap();
    }
}
