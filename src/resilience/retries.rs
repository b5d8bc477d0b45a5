//! Retry policy shared by backup and restore policies.
//!
//! A policy describes how often an operation is attempted and how long to
//! wait between attempts. `max_retries = 0` means a single attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::resilience::backoff::calculate_backoff;

/// Resolved retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_timeout: Duration,
    /// Growth factor applied per attempt (>= 1).
    pub multiplier: f64,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub const DEFAULT_BASE_TIMEOUT_MS: u64 = 1000;
    pub const DEFAULT_MULTIPLIER: f64 = 1.0;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(base_timeout: Duration, multiplier: f64, max_retries: u32) -> Self {
        Self {
            base_timeout,
            multiplier,
            max_retries,
        }
    }

    /// The base timeout as a duration.
    pub fn base_timeout(&self) -> Duration {
        self.base_timeout
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_timeout, self.multiplier)
    }

    /// Total number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run `op` until it succeeds, the error is not retryable, or attempts are exhausted.
    ///
    /// `op` receives the 0-indexed attempt number. The last error is returned.
    pub async fn retry<T, E, F, Fut, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < max_attempts && retryable(&e) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(attempt, delay = ?delay, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_millis(Self::DEFAULT_BASE_TIMEOUT_MS),
            multiplier: Self::DEFAULT_MULTIPLIER,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}
