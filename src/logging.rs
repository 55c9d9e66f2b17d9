//! Logging setup (SPEC_FULL.md §2.2).
//!
//! Hooks get wm's simple append-a-line-to-`hook.log` treatment: they run for milliseconds
//! and a tracing subscriber's setup cost isn't worth paying on every invocation. The
//! long-lived processes (processor, worker, supervisor) get a proper `tracing-subscriber`
//! stack with a rolling non-blocking file writer via `tracing-appender`, grounded in
//! oddjobs' daemon logging.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Append a single timestamped line to `<memories_dir>/hook.log`. Swallows I/O errors: a
/// hook must never fail the assistant session because logging failed.
pub fn log_hook(memories_dir: &Path, context: &str, message: &str) {
    let line = format!("[{}] {context}: {message}\n", chrono::Utc::now().to_rfc3339());
    let path = memories_dir.join("hook.log");
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        use std::io::Write;
        let _ = file.write_all(line.as_bytes());
    }
}

/// Initialize a `tracing` subscriber writing to `log_path`, honoring `CCMEM_LOG` as an
/// `EnvFilter` directive (default `info`). Returns the `WorkerGuard` that must be held for
/// the life of the process to flush the non-blocking writer.
pub fn init_daemon_logging(log_path: &Path) -> std::io::Result<WorkerGuard> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().unwrap_or_else(|| Path::new(".")),
        log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("ccmem.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("CCMEM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}
