//! Retry with backoff
//!
//! One loop shared by every call site that needs to absorb transient
//! failures, parameterized by attempt count and a predicate deciding which
//! errors are worth another try.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Spacing between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base_delay * n` after the n-th failure
    Linear,
    /// `base_delay * 2^(n-1)` after the n-th failure
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Cap applied to every computed delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
            backoff: Backoff::Linear,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay after the `failures`-th failed attempt (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let failures = failures.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(failures),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(failures - 1)),
        };
        delay.min(self.max_delay)
    }
}

/// The last error seen once retrying stopped.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts made, including the first
    pub attempts: u32,
    pub error: E,
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the policy's attempts are used up.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt < max_attempts && is_transient(&error) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
            }
            Err(error) => {
                return Err(RetryError {
                    attempts: attempt,
                    error,
                })
            }
        }
    }
}
