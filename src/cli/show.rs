//! `ccmem show <state|sessions|logs>`: introspection commands for manual debugging,
//! grounded in wm's `show.rs` (`show_state`, `show_sessions`, `format_size`).

use crate::config::Config;
use crate::discovery::discover_sessions;
use crate::error::CcmemError;
use crate::memory::MemoryStore;
use crate::paths::Paths;
use crate::progress::ProgressTracker;

pub fn show_state(config: &Config) -> Result<(), CcmemError> {
    let paths = Paths::new(config);
    if !paths.is_initialized() {
        println!("not initialized (run `ccmem init`)");
        return Ok(());
    }

    let store = MemoryStore::new(paths.memory_store(), config.max_memories);
    let count = store.len()?;
    println!("storage dir: {}", paths.base().display());
    println!("memories: {count} (max {})", config.max_memories);
    println!("memory store: {}", format_size(file_size(&paths.memory_store())));

    let progress = ProgressTracker::new(paths.progress_state());
    match progress.classify(config.stale_threshold)? {
        crate::progress::RunOutcome::NoState => println!("extraction: idle"),
        outcome => println!("extraction: {outcome:?}"),
    }

    Ok(())
}

/// `ccmem show logs`: tail the most recently modified log file under the logs directory
/// (worker, processor, or supervisor — whichever last ran).
pub fn show_logs(config: &Config) -> Result<(), CcmemError> {
    let paths = Paths::new(config);
    let logs_dir = paths.logs_dir();

    let latest = std::fs::read_dir(&logs_dir)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "log"))
        .max_by_key(|entry| entry.metadata().and_then(|m| m.modified()).ok());

    let Some(entry) = latest else {
        println!("no logs found in {}", logs_dir.display());
        return Ok(());
    };

    println!("=== {} ===", entry.path().display());
    let contents = std::fs::read_to_string(entry.path())?;
    for line in contents.lines().rev().take(100).collect::<Vec<_>>().into_iter().rev() {
        println!("{line}");
    }
    Ok(())
}

pub fn show_sessions() -> Result<(), CcmemError> {
    let sessions = discover_sessions()?;
    if sessions.is_empty() {
        println!("no sessions found for this project");
        return Ok(());
    }
    for session in sessions {
        println!("{}  {}", session.session_id, session.transcript_path.display());
    }
    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_scales_units() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
