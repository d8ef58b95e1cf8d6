//! Bounded retries with linear backoff.
//!
//! The delay before attempt `n + 1` is `n * base_interval`, plus a uniformly
//! random jitter in `[0, jitter]` when jitter is configured. Retries run
//! sequentially: an attempt's future has completed (and released whatever it
//! held) before the next one starts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::warn;

/// Default maximum number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff interval.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Attempt count and backoff parameters for one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first. Never below 1.
    pub max_attempts: u32,
    /// Backoff unit, multiplied by the number of failed attempts so far.
    pub base_interval: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_interval: DEFAULT_RETRY_INTERVAL,
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Create a policy without jitter.
    pub fn new(max_attempts: u32, base_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_interval,
            jitter: Duration::ZERO,
        }
    }

    /// A single attempt, no retry.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Set the maximum attempt count.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff unit.
    pub fn with_base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = interval;
        self
    }

    /// Set the jitter bound.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff to wait after `failed` attempts have failed.
    pub fn delay_for(&self, failed: u32) -> Duration {
        let base = self.base_interval.saturating_mul(failed);
        if self.jitter.is_zero() {
            return base;
        }
        let bound = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=bound);
        base.saturating_add(Duration::from_millis(extra))
    }
}

/// How a failed attempt should be treated.
#[derive(Debug)]
pub enum Failure<E> {
    /// Transient; try again if attempts remain.
    Retry(E),
    /// Stop now, regardless of remaining attempts.
    Abort(E),
}

/// The error returned once a retry loop gives up.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Attempts made, including the one that produced `error`.
    pub attempts: u32,
    /// Error from the last attempt.
    pub error: E,
}

/// Run `attempt` until it succeeds, aborts, runs out of attempts, or the
/// next backoff would end past `deadline`.
///
/// The closure receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut current = 1;

    loop {
        let error = match attempt(current).await {
            Ok(value) => return Ok(value),
            Err(Failure::Abort(error)) => {
                return Err(Exhausted {
                    attempts: current,
                    error,
                });
            }
            Err(Failure::Retry(error)) => error,
        };

        if current >= max_attempts {
            return Err(Exhausted {
                attempts: current,
                error,
            });
        }

        let delay = policy.delay_for(current);
        if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
            warn!(operation, attempt = current, error = %error, "deadline reached, giving up");
            return Err(Exhausted {
                attempts: current,
                error,
            });
        }

        warn!(
            operation,
            attempt = current,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        current += 1;
    }
}
