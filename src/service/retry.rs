//! Bounded retry for read queries that hit the connection cap.

use std::future::Future;
use std::time::Duration;

use crate::persistence::StoreError;

/// How often and how patiently a query is retried.
///
/// The delay before retry `n` (1-based) is `n × base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay unit multiplied by the attempt number.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy with `max_attempts` attempts spaced by multiples of
    /// `base_delay`.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
        }
    }

    /// Sleep before the attempt following failed attempt `attempt`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or
/// runs out of attempts.
///
/// Only [`StoreError::ConnectionLimit`] is retried. The last error is
/// returned once attempts are exhausted.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "connection limit hit, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
