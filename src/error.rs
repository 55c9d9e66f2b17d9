//! Typed errors for each component, composed into one top-level error at the CLI boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read memory store at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write memory store at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock memory store at {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt memory store document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read transcript registry at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write transcript registry at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock transcript registry at {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt transcript registry document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to open extraction queue at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock extraction queue at {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write extraction queue at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("failed to read circuit breaker state at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write circuit breaker state at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock circuit breaker state at {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to read progress state at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write progress state at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt progress state document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to spawn LLM subprocess: {0}")]
    Spawn(std::io::Error),
    #[error("LLM subprocess timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("LLM subprocess exited with failure: {0}")]
    NonZeroExit(String),
    #[error("malformed LLM output: {0}")]
    MalformedOutput(String),
    #[error("no LLM credentials available")]
    NoCredentials,
}

#[derive(Debug, Error)]
pub enum CcmemError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Breaker(#[from] BreakerError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("not initialized: run `ccmem init` first")]
    NotInitialized,
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("another extraction run is already active (pid {0})")]
    AlreadyRunning(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CcmemError>;
