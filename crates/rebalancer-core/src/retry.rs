//! Retry logic with exponential backoff
//!
//! Only the two network collaborators (market data and the language model) are
//! retried. Validation and allocation errors are deterministic and never reach
//! this module.

use crate::error::{ExplanationError, PriceFetchError};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Classifies errors that may succeed when the operation is repeated
pub trait Retryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;
}

impl Retryable for PriceFetchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::Provider(_)
        )
    }
}

impl Retryable for ExplanationError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::EmptyResponse => false,
            Self::Provider(e) => e.is_transient(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Backoff to wait before the given retry (1-based)
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((retry - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Execute an async operation with retry logic
    ///
    /// Non-retryable errors are returned immediately; otherwise the last error
    /// is returned once `max_attempts` is exhausted.
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Debug,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Attempt {}/{} for operation: {}", attempt, max_attempts, operation_name);

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(
                        "Operation '{}' failed with non-retryable error: {:?}",
                        operation_name, e
                    );
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        "Operation '{}' failed after {} attempts: {:?}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {:?}. Retrying in {:?}",
                        operation_name, attempt, max_attempts, e, backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
