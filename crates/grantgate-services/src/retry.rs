//! Retry with capped exponential backoff for retryable upstream failures.

use std::future::Future;
use std::time::Duration;

use grantgate_core::{GrantGateConfig, GrantResult, RetrySettings};

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    transient_codes: Vec<String>,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings, transient_codes: Vec<String>) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            transient_codes,
        }
    }

    pub fn from_config(config: &GrantGateConfig) -> Self {
        Self::new(&config.retry, config.transient_error_codes.clone())
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            transient_codes: Vec::new(),
        }
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    ///
    /// `op` must be idempotent; the last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> GrantResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GrantResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable(&self.transient_codes) => {
                    let delay = self.backoff(attempt - 1);
                    tracing::warn!(
                        operation = operation,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, retrying"
                    );
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
        Self::new(&RetrySettings::default(), Vec::new())
    }
}
