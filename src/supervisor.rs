//! Supervisor/Watchdog: spawns the Extraction Worker as a child process,
//! follows its JSON-lines stdout, and enforces the grace-period-then-kill shutdown
//! contract.
//!
//! Grounded in `oddjobs`' daemon lifecycle (`lifecycle.rs`): refuse to start a second
//! instance while one is live (here, via the Progress State Tracker rather than a separate
//! PID lock file, since the worker already maintains one), spawn via `tokio::process`, and
//! escalate from `SIGTERM` to `SIGKILL` after a grace period using `nix`.

use crate::config::Config;
use crate::error::CcmemError;
use crate::paths::Paths;
use crate::progress::{ProgressTracker, RunOutcome};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    Completed,
    FailedOrCrashed,
    Cancelled,
    /// A live run was already in progress; refused to start. Maps to exit code 2.
    AlreadyRunning,
}

/// Spawn `ccmem extract run` as a child, stream its stdout lines to `tracing`, and wait for
/// it to exit. Refuses to start if the Progress State Tracker shows a live run.
pub async fn supervise(config: &Config, exe_path: &str) -> Result<SupervisorExit, CcmemError> {
    let paths = Paths::new(config);
    let progress = ProgressTracker::new(paths.progress_state());

    if progress.classify(config.stale_threshold)? == RunOutcome::Running {
        return Ok(SupervisorExit::AlreadyRunning);
    }

    let mut child = Command::new(exe_path)
        .arg("extract")
        .arg("run")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(CcmemError::Io)?;

    let stdout = child.stdout.take().expect("piped stdout");
    let mut lines = BufReader::new(stdout).lines();

    let reader_handle = tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(target: "ccmem::worker", "{line}");
        }
    });

    let status = child.wait().await.map_err(CcmemError::Io)?;
    let _ = reader_handle.await;

    if !status.success() {
        return Ok(SupervisorExit::FailedOrCrashed);
    }

    finalize_exit(progress.classify(config.stale_threshold)?, &progress)
}

/// Map the final classification to a `SupervisorExit`, clearing the terminal state when the
/// run fully succeeded ("exit 0 and K has no failures → delete K").
fn finalize_exit(outcome: RunOutcome, progress: &ProgressTracker) -> Result<SupervisorExit, CcmemError> {
    match outcome {
        RunOutcome::Completed => {
            progress.clear()?;
            Ok(SupervisorExit::Completed)
        }
        RunOutcome::Cancelled => Ok(SupervisorExit::Cancelled),
        _ => Ok(SupervisorExit::FailedOrCrashed),
    }
}

/// Send `SIGTERM` to `child`, then escalate to `SIGKILL` if it hasn't exited within
/// `SHUTDOWN_GRACE`.
#[cfg(unix)]
pub async fn terminate_with_grace(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    if timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
        child.kill().await?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn terminate_with_grace(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_to_start_when_already_running() {
        use crate::progress::{ProgressState, RunStatus};
        use chrono::Utc;

        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load();
        config.storage_dir = tmp.path().join("ccmem");
        let paths = Paths::new(&config);
        paths.ensure_dirs().unwrap();

        let progress = ProgressTracker::new(paths.progress_state());
        progress
            .save(&ProgressState {
                pid: std::process::id(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                last_heartbeat: Utc::now(),
                transcripts: Vec::new(),
                error: None,
            })
            .unwrap();

        let result = supervise(&config, "/bin/true").await.unwrap();
        assert_eq!(result, SupervisorExit::AlreadyRunning);
    }

    #[test]
    fn finalize_exit_clears_state_on_completed() {
        use crate::progress::{ProgressState, RunStatus};
        use chrono::Utc;

        let tmp = tempfile::tempdir().unwrap();
        let progress = ProgressTracker::new(tmp.path().join("state.json"));
        progress
            .save(&ProgressState {
                pid: std::process::id(),
                status: RunStatus::Completed,
                started_at: Utc::now(),
                last_heartbeat: Utc::now(),
                transcripts: Vec::new(),
                error: None,
            })
            .unwrap();

        let result = finalize_exit(RunOutcome::Completed, &progress).unwrap();
        assert_eq!(result, SupervisorExit::Completed);
        assert!(progress.load().unwrap().is_none());
    }

    #[test]
    fn finalize_exit_retains_state_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let progress = ProgressTracker::new(tmp.path().join("state.json"));
        let result = finalize_exit(RunOutcome::Failed, &progress).unwrap();
        assert_eq!(result, SupervisorExit::FailedOrCrashed);
    }
}
