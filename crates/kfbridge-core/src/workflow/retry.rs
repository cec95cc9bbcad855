//! Retry policy for workflow API calls.
//!
//! Exponential backoff: the delay before retry `n` (1-based) is
//! `base_delay * 2^n`. A 429 response carrying `Retry-After` overrides the
//! computed delay. Only errors for which [`WorkflowError::is_retryable`]
//! holds are retried, and at most `max_retries` times.

use std::future::Future;
use std::time::Duration;

use kfbridge_types::config::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
use kfbridge_types::error::WorkflowError;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total number of attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Exponential delay before retry `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay before retry `retry`, honoring a server `Retry-After` hint.
    pub fn delay_for(&self, retry: u32, error: &WorkflowError) -> Duration {
        error
            .retry_after_ms()
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.backoff_delay(retry))
    }
}

// ---------------------------------------------------------------------------
// run_with_retry
// ---------------------------------------------------------------------------

/// Run `call` until it succeeds, fails permanently, or retries run out.
///
/// `call` receives the 1-based attempt number. The last error is returned
/// once retries are exhausted.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, WorkflowError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    let mut retries = 0u32;
    loop {
        let attempt = retries + 1;
        match call(attempt).await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for(retries, &err);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(operation, attempt, error = %err, "giving up");
                return Err(err);
            }
        }
    }
}
