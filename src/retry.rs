//! Bounded retry with a fixed delay around fallible async calls
//!
//! Every intermediate failure is logged as a warning and kept in the
//! returned error's trail; only the final failure is logged as an error.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Retry policy: attempt count and fixed inter-attempt delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_tries: config.max_tries.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// The last failure of an exhausted retry loop
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {last}")]
pub struct RetryError<E> {
    /// Name of the wrapped operation
    pub operation: String,
    /// Number of attempts made (always equal to `max_tries`)
    pub attempts: u32,
    /// The final failure
    #[source]
    pub last: E,
    /// Messages of the failures that were retried, oldest first
    pub intermediate: Vec<String>,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last
    }
}

impl RetryPolicy {
    pub fn new(max_tries: u32, delay: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or `max_tries` attempts have failed
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn call<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_tries = self.max_tries.max(1);
        let mut intermediate = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_tries => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_tries,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    intermediate.push(format!("attempt {}/{}: {}", attempt, max_tries, e));
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "giving up after final attempt"
                    );
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: e,
                        intermediate,
                    });
                }
            }
        }
    }
}
