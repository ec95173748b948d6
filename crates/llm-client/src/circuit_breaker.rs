use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::LlmError;
use crate::types::CircuitSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Wall-clock twin of `opened_at`, carried only so a snapshot can be
    /// persisted and restored across a process restart.
    opened_at_wall: Option<chrono::DateTime<Utc>>,
}

/// Guards LLM calls the way the donor's breaker-flag idiom guards broker
/// calls, generalized into a proper three-state machine: after
/// `failure_threshold` consecutive failures the breaker opens and short
/// circuits every call for `cool_down`; once the cooldown elapses exactly
/// one probe is let through (half-open) and its outcome decides whether the
/// breaker closes again or re-opens.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    /// Mirrors `inner.state == Open` for cheap sync reads (status
    /// reporting) without taking the async mutex.
    open_flag: AtomicBool,
    failure_threshold: u32,
    cool_down: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
                opened_at_wall: None,
            }),
            open_flag: AtomicBool::new(false),
            failure_threshold,
            cool_down,
        }
    }

    /// Runs `call` if the breaker allows it, recording the outcome. Returns
    /// `LlmError::CircuitOpen` without invoking `call` at all when the
    /// breaker is open and the cooldown hasn't elapsed yet.
    pub async fn call<F, Fut, T>(&self, call: F) -> Result<T, LlmError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        if !self.admit().await {
            return Err(LlmError::CircuitOpen);
        }

        match call().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(err)
            }
        }
    }

    /// Decides whether a call may proceed, transitioning Open -> HalfOpen
    /// once the cooldown has elapsed. Holds the lock only for the decision,
    /// never across the network call itself.
    async fn admit(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Closed => true,
            State::HalfOpen => false,
            State::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.cool_down {
                    inner.state = State::HalfOpen;
                    self.open_flag.store(false, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.opened_at_wall = None;
        self.open_flag.store(false, Ordering::Relaxed);
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.opened_at_wall = Some(Utc::now());
                self.open_flag.store(true, Ordering::Relaxed);
            }
            State::Closed | State::Open => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.opened_at_wall = Some(Utc::now());
                    self.open_flag.store(true, Ordering::Relaxed);
                }
            }
        }
    }

    pub async fn is_open(&self) -> bool {
        matches!(self.inner.lock().await.state, State::Open)
    }

    /// Cheap sync snapshot of breaker state for status endpoints and the
    /// `LlmProvider::is_circuit_open` trait method.
    pub fn is_open_sync(&self) -> bool {
        self.open_flag.load(Ordering::Relaxed)
    }

    /// Durable view of the current state, for `circuit_breaker_state`.
    pub async fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().await;
        CircuitSnapshot {
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at_wall,
            is_open: matches!(inner.state, State::Open),
        }
    }

    /// Resumes from a persisted snapshot. An open breaker resumes its
    /// cooldown from wherever it left off (the wall-clock gap since
    /// `opened_at` is carried over into the `Instant` the cooldown math
    /// actually reads), rather than either re-closing or re-opening a
    /// fresh full cooldown.
    pub async fn restore(&self, snapshot: CircuitSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = snapshot.consecutive_failures;
        if snapshot.is_open {
            let elapsed = snapshot
                .opened_at
                .map(|at| Utc::now().signed_duration_since(at))
                .and_then(|d| d.to_std().ok())
                .unwrap_or_default();
            inner.opened_at = Instant::now().checked_sub(elapsed);
            inner.opened_at_wall = snapshot.opened_at;
            inner.state = State::Open;
            self.open_flag.store(true, Ordering::Relaxed);
        } else {
            inner.opened_at = None;
            inner.opened_at_wall = None;
            inner.state = State::Closed;
            self.open_flag.store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<u32, LlmError> {
        Ok(1)
    }

    async fn fail() -> Result<u32, LlmError> {
        Err(LlmError::InvalidResponse("boom".into()))
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            assert!(breaker.call(fail).await.is_err());
            assert!(!breaker.is_open().await);
        }
        assert!(breaker.call(fail).await.is_err());
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_invoking_call() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        assert!(breaker.call(fail).await.is_err());
        assert!(breaker.is_open().await);

        let result = breaker.call(ok).await;
        assert!(matches!(result, Err(LlmError::CircuitOpen)));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(breaker.call(fail).await.is_err());
        assert!(breaker.call(ok).await.is_ok());
        assert!(breaker.call(fail).await.is_err());
        assert!(!breaker.is_open().await);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_closes_breaker_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        assert!(breaker.call(fail).await.is_err());
        assert!(breaker.is_open().await);

        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(breaker.call(ok).await.is_ok());
        assert!(!breaker.is_open().await);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        assert!(breaker.call(fail).await.is_err());
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(breaker.call(fail).await.is_err());
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn restore_reopens_a_breaker_that_was_open_at_shutdown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker
            .restore(CircuitSnapshot {
                consecutive_failures: 1,
                opened_at: Some(Utc::now()),
                is_open: true,
            })
            .await;
        assert!(breaker.is_open().await);
        assert!(breaker.is_open_sync());

        let result = breaker.call(ok).await;
        assert!(matches!(result, Err(LlmError::CircuitOpen)));
    }

    #[tokio::test]
    async fn restore_leaves_a_closed_snapshot_closed() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker
            .restore(CircuitSnapshot {
                consecutive_failures: 1,
                opened_at: None,
                is_open: false,
            })
            .await;
        assert!(!breaker.is_open().await);
        assert!(breaker.call(ok).await.is_ok());
    }

    #[tokio::test]
    async fn snapshot_roundtrips_an_open_breaker() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        assert!(breaker.call(fail).await.is_err());
        let snapshot = breaker.snapshot().await;
        assert!(snapshot.is_open);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert!(snapshot.opened_at.is_some());
    }
}
