//! Retry-with-backoff as a single higher-order helper parameterized by the
//! error's own `is_retryable()` classification, so non-retryable domain
//! errors (e.g. per-market collateral validation) short-circuit instead of
//! being retried blindly.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AgentError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 300,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
        }
    }
}

/// Run `f` until it succeeds, its error is non-retryable, or the retry
/// budget is exhausted. Exponential backoff between attempts, capped at
/// `max_delay_ms`.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut delay_ms = config.initial_delay_ms;
    let mut attempt: u32 = 0;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_retryable() || attempt > config.max_retries {
                    return Err(err);
                }
                warn!(
                    operation = operation_name,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = ((delay_ms as f64) * config.backoff_factor) as u64;
                delay_ms = delay_ms.min(config.max_delay_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_first_try() {
        let counter = AtomicU32::new(0);
        let result: Result<u32, AgentError> = with_retry(&RetryConfig::default(), "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let cfg = RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_factor: 2.0,
        };
        let result: Result<u32, AgentError> = with_retry(&cfg, "test", || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(AgentError::TransientNetwork("boom".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_short_circuits() {
        let counter = AtomicU32::new(0);
        let result: Result<u32, AgentError> = with_retry(&RetryConfig::default(), "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(AgentError::validation("bad request")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
