//! Circuit Breaker: caps how many extraction jobs a rolling window may
//! admit, so a pathological burst of session stops can't flood the LLM subprocess pool.
//!
//! New component — wm has no analogous frequency throttle — but the state-file
//! shape (single JSON document, exclusive-locked read-modify-write, atomic rename) follows
//! every other state file in this crate, grounded in wm's `state.rs`.

use crate::error::BreakerError;
use crate::lockfile::{self, ExclusiveLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct BreakerState {
    window_start: DateTime<Utc>,
    event_count: u32,
}

pub struct CircuitBreaker {
    path: PathBuf,
    window: Duration,
    max_per_window: u32,
}

impl CircuitBreaker {
    pub fn new(path: PathBuf, window: Duration, max_per_window: u32) -> Self {
        Self { path, window, max_per_window }
    }

    fn load_unlocked(&self, now: DateTime<Utc>) -> Result<BreakerState, BreakerError> {
        if !self.path.exists() {
            return Ok(BreakerState { window_start: now, event_count: 0 });
        }
        let bytes = std::fs::read(&self.path).map_err(|source| BreakerError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(BreakerState { window_start: now, event_count: 0 });
        }
        serde_json::from_slice(&bytes)
            .map_err(|_| BreakerError::Read {
                path: self.path.display().to_string(),
                source: std::io::Error::other("corrupt breaker state"),
            })
    }

    fn save_unlocked(&self, state: &BreakerState) -> Result<(), BreakerError> {
        let bytes = serde_json::to_vec(state).unwrap_or_default();
        lockfile::atomic_write(&self.path, &bytes).map_err(|source| BreakerError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Record an admission attempt at `event_time` and return whether it's allowed under
    /// the rolling window. Rejected attempts are not counted against the window.
    pub fn allow(&self, event_time: DateTime<Utc>) -> Result<bool, BreakerError> {
        let _guard = ExclusiveLock::acquire(&self.path).map_err(|source| BreakerError::Lock {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut state = self.load_unlocked(event_time)?;

        let elapsed = event_time.signed_duration_since(state.window_start);
        if elapsed < chrono::Duration::zero() || elapsed.to_std().unwrap_or(Duration::MAX) >= self.window {
            state.window_start = event_time;
            state.event_count = 0;
        }

        if state.event_count >= self.max_per_window {
            return Ok(false);
        }

        state.event_count += 1;
        self.save_unlocked(&state)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_per_window() {
        let tmp = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(tmp.path().join("breaker.json"), Duration::from_secs(60), 3);
        let t0 = Utc::now();
        assert!(breaker.allow(t0).unwrap());
        assert!(breaker.allow(t0).unwrap());
        assert!(breaker.allow(t0).unwrap());
        assert!(!breaker.allow(t0).unwrap());
    }

    #[test]
    fn resets_after_window_elapses() {
        let tmp = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(tmp.path().join("breaker.json"), Duration::from_secs(60), 1);
        let t0 = Utc::now();
        assert!(breaker.allow(t0).unwrap());
        assert!(!breaker.allow(t0 + chrono::Duration::seconds(10)).unwrap());
        assert!(breaker.allow(t0 + chrono::Duration::seconds(61)).unwrap());
    }

    #[test]
    fn rejected_attempts_are_not_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let breaker = CircuitBreaker::new(tmp.path().join("breaker.json"), Duration::from_secs(60), 1);
        let t0 = Utc::now();
        assert!(breaker.allow(t0).unwrap());
        for _ in 0..5 {
            assert!(!breaker.allow(t0).unwrap());
        }
        assert!(breaker.allow(t0 + chrono::Duration::seconds(61)).unwrap());
    }
}
