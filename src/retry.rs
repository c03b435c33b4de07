//! Bounded retry with a fixed delay
//!
//! Every call the pipeline makes to an external provider goes through one of
//! these policies. The pause between attempts is constant.

use crate::error::{KairosError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 5 attempts, 1s apart
    pub const fn significance() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }

    /// 3 attempts, 5s apart
    pub const fn short_term_memory() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }

    /// 3 attempts, 1s apart
    pub const fn decision() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// The closure receives the 1-based attempt number. Retryable failures
    /// (transport, malformed response) are logged and retried after `delay`;
    /// no delay follows the final attempt. Exhaustion yields
    /// [`KairosError::RetriesExhausted`] carrying the last error text.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed on attempt {}/{}: {}",
                        operation, attempt, max_attempts, e
                    );
                    last_error = e.to_string();

                    if attempt < max_attempts {
                        sleep(self.delay).await;
                    }
                }
            }
        }

        Err(KairosError::RetriesExhausted {
            operation: operation.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::decision()
    }
}
