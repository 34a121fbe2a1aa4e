use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Retry after the computed backoff delay.
    Retry,
    /// Retry after a server-provided delay (HTTP `Retry-After`), capped by
    /// the configured maximum.
    RetryAfter(Duration),
    Abort,
}

/// Exponential backoff with jitter for idempotent Graph reads (listings and
/// content downloads). Mutating calls are never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_secs: 5,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    /// No retries at all; the first error is returned.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    /// Delay for a given retry attempt (0-indexed):
    /// `min(base * 2^retry, max) + jitter(0..base)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        Duration::from_secs(capped + jitter)
    }

    fn delay_for(&self, action: RetryAction, retry: u32) -> Duration {
        match action {
            RetryAction::RetryAfter(hint) => hint.min(Duration::from_secs(self.max_delay_secs)),
            _ => self.delay_for_retry(retry),
        }
    }
}

/// Run `operation` until it succeeds, the classifier aborts, or retries are
/// exhausted. Returns the last error in the latter two cases.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        let action = classifier(&err);
        attempt += 1;
        if action == RetryAction::Abort || attempt >= total_attempts {
            return Err(err);
        }
        let delay = config.delay_for(action, attempt - 1);
        tracing::warn!(
            "Retryable error (attempt {}/{}), retrying in {}s: {}",
            attempt,
            total_attempts,
            delay.as_secs(),
            err
        );
        tokio::time::sleep(delay).await;
    }
}
