//! Retry wrapper for transient transaction failures.

use std::future::Future;
use std::time::Duration;

use consta_common::Result;

use crate::config::RetryPolicy;

/// Run `operation` until it succeeds, fails permanently, or exhausts the
/// policy's attempts. The attempt number (starting at 1) is passed to each
/// call. Only errors marked retryable are retried; see
/// [`consta_common::EngineError::is_retryable`].
pub async fn with_policy<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let backoff = backoff_delay(policy.base_backoff_ms, attempt);
                tracing::warn!(
                    target: "engine.retry",
                    attempt,
                    max_attempts = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "transaction failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff: the base doubles per completed attempt.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms << (attempt - 1).min(16))
}
