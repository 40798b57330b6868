//! Retry policy with exponential backoff for provider requests.
//!
//! Backoff doubles per retry, capped at the configured maximum. Only
//! transient provider errors are retried; everything else fails fast.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    /// Execute `operation`, retrying transient failures with exponential
    /// backoff.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> HealResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HealResult<T>>,
    {
        let mut backoff_ms = self.initial_backoff_ms;
        let mut last_err: Option<HealError> = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    debug!(attempt, backoff_ms, error = %err, "transient provider error, retrying");
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.max_backoff_ms);
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            HealError::provider("retry", "retries exhausted without a recorded error")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            requests_per_second: 100.0,
        })
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let attempts = AtomicU32::new(0);
        let result = policy()
            .execute(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 1 {
                    Err(HealError::provider("test", "timeout"))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let result: HealResult<()> = policy()
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(HealError::Configuration("bad key".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: HealResult<()> = policy()
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(HealError::provider("test", "quota"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
