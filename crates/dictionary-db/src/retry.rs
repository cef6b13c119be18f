//! Retry policies and circuit breaker for transient database conditions.
//!
//! Two linear backoff schedules are used, matching the two call sites that
//! retry in this core: the batcher's deadlock retry (3 attempts, 100ms ×
//! attempt) and staging finalize's dual retry (lock-busy: 1s fixed, up to 20
//! attempts; deadlock: 500ms × attempt).

use crate::error::{DbError, DbResult};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Thread-safe circuit breaker guarding the retryable-transient error class.
pub struct CircuitBreaker {
    failures: AtomicU32,
    open_until_us: AtomicU64,
    threshold: u32,
    reset_duration: Duration,
    epoch: Instant,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, reset_duration: Duration) -> Self {
        Self {
            failures: AtomicU32::new(0),
            open_until_us: AtomicU64::new(0),
            threshold,
            reset_duration,
            epoch: Instant::now(),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        let open_until = self.open_until_us.load(Ordering::Acquire);
        let now_us = self.now_us();
        if open_until > 0 && now_us < open_until {
            return CircuitState::Open;
        }
        if self.failures.load(Ordering::Acquire) >= self.threshold {
            return CircuitState::HalfOpen;
        }
        CircuitState::Closed
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn remaining_open_secs(&self) -> f64 {
        let open_until = self.open_until_us.load(Ordering::Acquire);
        let now_us = self.now_us();
        if open_until == 0 || now_us >= open_until {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let secs = (open_until - now_us) as f64 / 1_000_000.0;
        secs
    }

    pub fn check(&self) -> DbResult<()> {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => Err(DbError::CircuitBreakerOpen {
                message: format!(
                    "circuit open after {} consecutive failures, resets in {:.1}s",
                    self.failures.load(Ordering::Acquire),
                    self.remaining_open_secs(),
                ),
                failures: self.failures.load(Ordering::Acquire),
                reset_after_secs: self.remaining_open_secs(),
            }),
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        self.open_until_us.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        let new_count = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if new_count >= self.threshold {
            let open_until = self.now_us() + micros_from_duration(self.reset_duration);
            self.open_until_us.store(open_until, Ordering::Release);
        }
    }

    pub fn reset(&self) {
        self.failures.store(0, Ordering::Release);
        self.open_until_us.store(0, Ordering::Release);
    }

    fn now_us(&self) -> u64 {
        micros_from_duration(self.epoch.elapsed())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn micros_from_duration(d: Duration) -> u64 {
    let us = d.as_micros();
    if us > u64::MAX as u128 { u64::MAX } else { us as u64 }
}

/// Global circuit breaker shared by the batcher and the finalize path.
pub static CIRCUIT_BREAKER: std::sync::LazyLock<CircuitBreaker> =
    std::sync::LazyLock::new(CircuitBreaker::default);

/// Batcher deadlock retry: 3 attempts, `100ms * attempt` linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct BatcherRetryPolicy {
    pub max_retries: u32,
    pub delay_per_attempt: Duration,
}

impl Default for BatcherRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_per_attempt: Duration::from_millis(100),
        }
    }
}

impl BatcherRetryPolicy {
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_per_attempt * attempt.max(1)
    }
}

/// Staging finalize retry: lock-busy sleeps 1s fixed up to 20 times;
/// deadlock sleeps `500ms * attempt` up to `max_deadlock_retries` times, then
/// raises a fatal finalize-failed condition.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeRetryPolicy {
    pub max_lock_busy_retries: u32,
    pub lock_busy_delay: Duration,
    pub max_deadlock_retries: u32,
    pub deadlock_delay_per_attempt: Duration,
}

impl Default for FinalizeRetryPolicy {
    fn default() -> Self {
        Self {
            max_lock_busy_retries: 20,
            lock_busy_delay: Duration::from_secs(1),
            max_deadlock_retries: 10,
            deadlock_delay_per_attempt: Duration::from_millis(500),
        }
    }
}

impl FinalizeRetryPolicy {
    #[must_use]
    pub fn deadlock_delay_for_attempt(&self, attempt: u32) -> Duration {
        self.deadlock_delay_per_attempt * attempt.max(1)
    }
}

/// Execute `op` under the batcher's deadlock retry policy. Non-deadlock
/// errors pass through on the first attempt (parameter overflow is handled
/// by the caller's chunking path, never retried here).
pub fn retry_batcher_deadlock<T, F>(policy: &BatcherRetryPolicy, mut op: F) -> DbResult<T>
where
    F: FnMut() -> DbResult<T>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_deadlock() && attempt < policy.max_retries => {
                attempt += 1;
                CIRCUIT_BREAKER.record_failure();
                std::thread::sleep(policy.delay_for_attempt(attempt));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Execute `op` under the finalize retry policy: lock-busy retries up to
/// `max_lock_busy_retries` times at a fixed interval; deadlock retries up to
/// `max_deadlock_retries` times with linear backoff, then returns the
/// underlying error for the caller to raise as a fatal finalize-failed
/// condition.
pub fn retry_finalize<T, F>(policy: &FinalizeRetryPolicy, mut op: F) -> DbResult<(T, u32)>
where
    F: FnMut() -> DbResult<T>,
{
    let mut lock_busy_attempts = 0u32;
    let mut deadlock_attempts = 0u32;
    let mut total_attempts = 0u32;
    loop {
        total_attempts += 1;
        match op() {
            Ok(v) => return Ok((v, total_attempts)),
            Err(e) if e.is_lock_busy() && lock_busy_attempts < policy.max_lock_busy_retries => {
                lock_busy_attempts += 1;
                std::thread::sleep(policy.lock_busy_delay);
            }
            Err(e) if e.is_deadlock() && deadlock_attempts < policy.max_deadlock_retries => {
                deadlock_attempts += 1;
                std::thread::sleep(policy.deadlock_delay_for_attempt(deadlock_attempts));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn circuit_breaker_opens_at_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.check().is_err());
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(20));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn batcher_policy_uses_linear_schedule() {
        let policy = BatcherRetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn batcher_retry_gives_up_after_three_deadlocks() {
        let policy = BatcherRetryPolicy {
            max_retries: 3,
            delay_per_attempt: Duration::from_millis(1),
        };
        let attempts = Cell::new(0u32);
        let result: DbResult<()> = retry_batcher_deadlock(&policy, || {
            attempts.set(attempts.get() + 1);
            Err(DbError::ResourceBusy {
                code: 1205,
                message: "deadlock".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 4);
    }

    #[test]
    fn finalize_retry_succeeds_after_lock_busy_retries() {
        let policy = FinalizeRetryPolicy {
            max_lock_busy_retries: 5,
            lock_busy_delay: Duration::from_millis(1),
            max_deadlock_retries: 10,
            deadlock_delay_per_attempt: Duration::from_millis(1),
        };
        let attempts = Cell::new(0u32);
        let (value, total) = retry_finalize(&policy, || {
            let n = attempts.get();
            attempts.set(n + 1);
            if n < 2 {
                Err(DbError::ResourceBusy {
                    code: 56002,
                    message: "advisory lock busy".into(),
                })
            } else {
                Ok(42)
            }
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(total, 3);
    }

    #[test]
    fn finalize_retry_propagates_non_retryable_error() {
        let policy = FinalizeRetryPolicy::default();
        let result: DbResult<(i32, u32)> =
            retry_finalize(&policy, || Err(DbError::invalid("source_code", "blank")));
        assert!(result.is_err());
    }

    #[test]
    fn finalize_retry_gives_up_after_max_deadlock_retries() {
        let policy = FinalizeRetryPolicy {
            max_lock_busy_retries: 5,
            lock_busy_delay: Duration::from_millis(1),
            max_deadlock_retries: 3,
            deadlock_delay_per_attempt: Duration::from_millis(1),
        };
        let attempts = Cell::new(0u32);
        let result: DbResult<(i32, u32)> = retry_finalize(&policy, || {
            attempts.set(attempts.get() + 1);
            Err(DbError::ResourceBusy {
                code: 1205,
                message: "deadlock".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 4);
    }
}
