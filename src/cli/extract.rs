//! `ccmem extract run|supervise|cleanup`.

use crate::config::Config;
use crate::error::CcmemError;
use crate::paths::Paths;
use crate::progress::{ProgressTracker, RunOutcome};
use crate::supervisor::{supervise, SupervisorExit};
use crate::worker;

/// `ccmem extract run`: run the Extraction Worker directly in the foreground, racing
/// SIGTERM/SIGINT. This is what the Supervisor spawns as a child, but it's also valid to
/// invoke directly for manual/foreground extraction.
pub async fn run(config: &Config) -> Result<crate::progress::RunStatus, CcmemError> {
    worker::run_with_signal_handling(config).await
}

/// `ccmem extract supervise`: spawn `extract run` as a supervised child process.
pub async fn run_supervised(config: &Config, exe_path: &str) -> Result<SupervisorExit, CcmemError> {
    supervise(config, exe_path).await
}

/// `ccmem extract cleanup`: clear a terminal (non-running) progress state so a fresh run
/// can start. Refuses to clear a genuinely live run.
pub fn cleanup(config: &Config) -> Result<(), CcmemError> {
    let paths = Paths::new(config);
    let progress = ProgressTracker::new(paths.progress_state());

    match progress.classify(config.stale_threshold)? {
        RunOutcome::Running => Err(CcmemError::AlreadyRunning(
            progress.load()?.map(|s| s.pid).unwrap_or(0),
        )),
        RunOutcome::NoState => Ok(()),
        _ => progress.clear().map_err(CcmemError::from),
    }
}
