//! Conversation memory extraction pipeline for AI coding assistant hooks.
//!
//! Entry point shape grounded in wm's `main.rs`: a single clap `Cli`/`Commands` tree
//! dispatching into per-subcommand modules, returning `ExitCode` rather than calling
//! `std::process::exit` directly so `main` stays a thin dispatcher.

mod breaker;
mod cli;
mod config;
mod discovery;
mod error;
mod extractor;
mod lockfile;
mod logging;
mod memory;
mod paths;
mod pipeline;
mod processor;
mod progress;
mod queue;
mod registry;
mod retrieval;
mod router;
mod supervisor;
mod transcript;
mod validator;
mod worker;

use clap::{Parser, Subcommand};
use config::Config;
use error::CcmemError;
use progress::RunStatus;
use std::process::ExitCode;
use supervisor::SupervisorExit;

#[derive(Parser)]
#[command(name = "ccmem", about = "Conversation memory extraction pipeline for AI coding assistant hooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the memory storage directory.
    Init,
    /// Claude Code hook entry points.
    Hook {
        #[command(subcommand)]
        event: HookEvent,
    },
    /// Show pipeline state for debugging.
    Show {
        #[command(subcommand)]
        what: ShowWhat,
    },
    /// Two-pass extraction.
    Extract {
        #[command(subcommand)]
        action: ExtractAction,
    },
    /// Background queue processor.
    Processor {
        #[command(subcommand)]
        action: ProcessorAction,
    },
}

#[derive(Subcommand)]
enum HookEvent {
    SessionStart,
    SessionStop,
    SubagentSessionStop,
    ToolCompleted,
    PreCompaction,
}

#[derive(Subcommand)]
enum ShowWhat {
    State,
    Sessions,
    /// Tail the most recent extraction worker/processor log file.
    Logs,
}

#[derive(Subcommand)]
enum ExtractAction {
    /// Run the Extraction Worker directly in the foreground.
    Run,
    /// Spawn the Extraction Worker as a supervised child process.
    Supervise,
    /// Clear a terminal progress state so a new run can start.
    Cleanup,
}

#[derive(Subcommand)]
enum ProcessorAction {
    /// Run the background queue processor forever.
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(dispatch(cli.command, &config))
}

async fn dispatch(command: Commands, config: &Config) -> ExitCode {
    match command {
        Commands::Init => exit_for_result(cli::init::run(config)),
        Commands::Hook { event } => {
            // Hooks always exit 0: a failure here must never surface as a visible error in
            // the assistant session.
            let _ = match event {
                HookEvent::SessionStart => cli::hook::session_start(config),
                HookEvent::SessionStop => cli::hook::session_stop(config),
                HookEvent::SubagentSessionStop => cli::hook::subagent_session_stop(config),
                HookEvent::ToolCompleted => cli::hook::tool_completed(config),
                HookEvent::PreCompaction => cli::hook::pre_compaction(config),
            };
            ExitCode::SUCCESS
        }
        Commands::Show { what } => {
            let result = match what {
                ShowWhat::State => cli::show::show_state(config),
                ShowWhat::Sessions => cli::show::show_sessions(),
                ShowWhat::Logs => cli::show::show_logs(config),
            };
            exit_for_result(result)
        }
        Commands::Extract { action } => match action {
            ExtractAction::Run => {
                let _guard = init_worker_logging(config);
                exit_for_run_status(cli::extract::run(config).await)
            }
            ExtractAction::Supervise => {
                let paths = paths::Paths::new(config);
                let _guard = logging::init_daemon_logging(&paths.supervisor_log()).ok();
                let exe = std::env::current_exe()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "ccmem".to_string());
                exit_for_supervisor_exit(cli::extract::run_supervised(config, &exe).await)
            }
            ExtractAction::Cleanup => exit_for_result(cli::extract::cleanup(config)),
        },
        Commands::Processor { action } => match action {
            ProcessorAction::Run => {
                let paths = paths::Paths::new(config);
                let _guard = logging::init_daemon_logging(&paths.processor_log()).ok();
                exit_for_result(cli::processor::run(config).await)
            }
        },
    }
}

/// Extraction Worker runs get their own timestamped log file (`extraction_worker_<timestamp>.log`
/// naming) so a resumed run doesn't clobber the previous attempt's log.
fn init_worker_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let paths = paths::Paths::new(config);
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    logging::init_daemon_logging(&paths.worker_log(&timestamp)).ok()
}

fn exit_for_result(result: Result<(), CcmemError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ccmem: {err}");
            ExitCode::FAILURE
        }
    }
}

fn exit_for_run_status(result: Result<RunStatus, CcmemError>) -> ExitCode {
    match result {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(RunStatus::Cancelled) => ExitCode::from(130),
        Ok(RunStatus::Running) | Ok(RunStatus::Failed) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("ccmem: {err}");
            ExitCode::FAILURE
        }
    }
}

fn exit_for_supervisor_exit(result: Result<SupervisorExit, CcmemError>) -> ExitCode {
    match result {
        Ok(SupervisorExit::Completed) => ExitCode::SUCCESS,
        Ok(SupervisorExit::Cancelled) => ExitCode::from(130),
        Ok(SupervisorExit::FailedOrCrashed) => ExitCode::FAILURE,
        Ok(SupervisorExit::AlreadyRunning) => ExitCode::from(2),
        Err(err) => {
            eprintln!("ccmem: {err}");
            ExitCode::FAILURE
        }
    }
}
