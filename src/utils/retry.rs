//! Timeout and exponential-backoff retry for external calls.

use crate::types::{AppError, Result};
use crate::utils::config::RetryConfig;
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, warn};

/// Bounds every attempt by a timeout and retries failures with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            call_timeout: config.call_timeout(),
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry(call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            max_retries: 0,
            base_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        self.base_delay.mul_f64(factor)
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    ///
    /// Invalid input and cancellation are returned immediately.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(operation = operation_name, attempt, max_attempts, "Attempting operation");

            let outcome = match timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(self.call_timeout.as_millis() as u64)),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err @ (AppError::InvalidInput(_) | AppError::Cancelled)) => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Operation failed after all retry attempts"
                );
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            warn!(
                operation = operation_name,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Operation failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
