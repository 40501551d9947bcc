//! Per-adapter circuit breaker: lock-free atomic state machine.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Clock abstraction so breaker timing is deterministically testable without
/// real sleeps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct MonotonicClock {
    start: Option<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Some(Instant::now()) }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.start.unwrap_or_else(Instant::now).elapsed().as_millis() as u64
    }
}

/// A clock whose value is advanced manually; used in tests to exercise
/// `reset_timeout` transitions without real sleeps.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub max_failures: usize,
    pub reset_timeout: Duration,
    pub success_threshold: usize,
    pub half_open_max: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
            half_open_max: 1,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    #[error("circuit breaker is open")]
    BreakerOpen,
    #[error("too many concurrent half-open probes")]
    TooManyRequests,
}

struct Inner {
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
    half_open_inflight: AtomicUsize,
    last_state_change_millis: AtomicU64,
    generation: AtomicU32,
}

/// Atomic, lock-free circuit breaker. One instance per adapter; shared via
/// `Arc` with the registry and router.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(STATE_CLOSED),
                consecutive_failures: AtomicUsize::new(0),
                consecutive_successes: AtomicUsize::new(0),
                half_open_inflight: AtomicUsize::new(0),
                last_state_change_millis: AtomicU64::new(0),
                generation: AtomicU32::new(0),
            }),
            config,
            clock,
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_CLOSED => CircuitState::Closed,
            STATE_OPEN => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    pub fn generation(&self) -> u32 {
        self.inner.generation.load(Ordering::Acquire)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        match self.inner.state.compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                self.inner.generation.fetch_add(1, Ordering::AcqRel);
                self.inner.last_state_change_millis.store(self.clock.now_millis(), Ordering::Release);
                true
            }
            Err(_) => false,
        }
    }

    /// Must be called before dispatching through the adapter. On success the
    /// caller must eventually call exactly one of `on_success`/`on_failure`.
    pub fn try_admit(&self) -> Result<(), AdmissionRejection> {
        loop {
            match self.inner.state.load(Ordering::Acquire) {
                STATE_CLOSED => return Ok(()),
                STATE_OPEN => {
                    let opened_at = self.inner.last_state_change_millis.load(Ordering::Acquire);
                    let elapsed = self.clock.now_millis().saturating_sub(opened_at);
                    if elapsed < self.config.reset_timeout.as_millis() as u64 {
                        return Err(AdmissionRejection::BreakerOpen);
                    }
                    if self.transition(STATE_OPEN, STATE_HALF_OPEN) {
                        self.inner.half_open_inflight.store(0, Ordering::Release);
                        self.inner.consecutive_successes.store(0, Ordering::Release);
                    }
                    // Either we won the race or another caller did; loop to
                    // re-read state and handle half-open admission.
                }
                STATE_HALF_OPEN => {
                    let inflight = self.inner.half_open_inflight.fetch_add(1, Ordering::AcqRel);
                    if inflight < self.config.half_open_max {
                        return Ok(());
                    }
                    self.inner.half_open_inflight.fetch_sub(1, Ordering::AcqRel);
                    return Err(AdmissionRejection::TooManyRequests);
                }
                _ => unreachable!("invalid breaker state byte"),
            }
        }
    }

    pub fn on_success(&self) {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                self.inner.half_open_inflight.fetch_sub(1, Ordering::AcqRel);
                let successes = self.inner.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    if self.transition(STATE_HALF_OPEN, STATE_CLOSED) {
                        self.inner.consecutive_failures.store(0, Ordering::Release);
                        self.inner.consecutive_successes.store(0, Ordering::Release);
                    }
                }
            }
            _ => {
                self.inner.consecutive_failures.store(0, Ordering::Release);
            }
        }
    }

    pub fn on_failure(&self) {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                self.inner.half_open_inflight.fetch_sub(1, Ordering::AcqRel);
                self.transition(STATE_HALF_OPEN, STATE_OPEN);
            }
            STATE_CLOSED => {
                let failures = self.inner.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.max_failures {
                    self.transition(STATE_CLOSED, STATE_OPEN);
                }
            }
            STATE_OPEN => {}
            _ => unreachable!("invalid breaker state byte"),
        }
    }

    /// Runs `operation` gated by the breaker, recording success/failure
    /// automatically. Returns `Err(AdmissionRejection)` without ever calling
    /// `operation` if admission is refused.
    pub async fn execute<T, E, Fut>(&self, operation: impl FnOnce() -> Fut) -> Result<Result<T, E>, AdmissionRejection>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_admit()?;
        let result = operation().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(max_failures: usize) -> CircuitBreaker {
        CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                max_failures,
                reset_timeout: Duration::from_millis(100),
                success_threshold: 2,
                half_open_max: 1,
            },
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn opens_at_exactly_max_failures() {
        let b = breaker(3);
        for _ in 0..2 {
            b.try_admit().unwrap();
            b.on_failure();
        }
        assert_eq!(b.state(), CircuitState::Closed);

        b.try_admit().unwrap();
        b.on_failure();
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn generation_strictly_increases_across_transitions() {
        let b = breaker(1);
        let g0 = b.generation();
        b.try_admit().unwrap();
        b.on_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.generation() > g0);
    }

    #[test]
    fn rejects_admission_while_open_before_reset_timeout() {
        let b = breaker(1);
        b.try_admit().unwrap();
        b.on_failure();
        assert_eq!(b.try_admit(), Err(AdmissionRejection::BreakerOpen));
    }

    #[test]
    fn half_open_limits_concurrent_probes() {
        let clock = Arc::new(ManualClock::new());
        let b = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                max_failures: 1,
                reset_timeout: Duration::from_millis(10),
                success_threshold: 1,
                half_open_max: 1,
            },
            clock.clone(),
        );
        b.try_admit().unwrap();
        b.on_failure();
        clock.advance(Duration::from_millis(20));

        b.try_admit().unwrap();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.try_admit(), Err(AdmissionRejection::TooManyRequests));
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let clock = Arc::new(ManualClock::new());
        let b = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                max_failures: 1,
                reset_timeout: Duration::from_millis(10),
                success_threshold: 2,
                half_open_max: 5,
            },
            clock.clone(),
        );
        b.try_admit().unwrap();
        b.on_failure();
        clock.advance(Duration::from_millis(20));

        b.try_admit().unwrap();
        b.on_success();
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.try_admit().unwrap();
        b.on_success();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let clock = Arc::new(ManualClock::new());
        let b = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                max_failures: 1,
                reset_timeout: Duration::from_millis(10),
                success_threshold: 2,
                half_open_max: 5,
            },
            clock,
        );
        b.try_admit().unwrap();
        b.on_failure();

        // can't probe yet
        assert_eq!(b.try_admit(), Err(AdmissionRejection::BreakerOpen));
    }
}
