//! Retry utilities with exponential backoff
//!
//! Used by the orchestrator when *opening* a completion stream. Once a stream
//! has produced its first chunk nothing is retried, so a retried request never
//! duplicates visible output. Retrying is disabled by default
//! ([`RetryConfig::disabled`]): a single failed request ends the run.
//!
//! # Examples
//!
//! ```rust,no_run
//! use agentloop::retry::{retry_with_backoff, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_initial_delay(Duration::from_millis(250));
//!
//! let value = retry_with_backoff(&config, || async {
//!     Ok::<_, agentloop::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,

    /// Random jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based), with jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = exponential_delay.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_delay = capped_delay + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

/// Whether a failed request is worth repeating.
///
/// Transport failures, timeouts and 5xx responses are transient. 4xx
/// responses, malformed streams and local errors are not.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Http(_) | Error::Timeout | Error::ServerUnavailable { .. } => true,
        Error::ClientError { .. }
        | Error::InvalidResponse(_)
        | Error::Json(_)
        | Error::Config(_)
        | Error::Tool(_)
        | Error::InvalidInput(_)
        | Error::Other(_) => false,
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempts run out. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts || !is_retryable_error(&err) {
                    return Err(err);
                }
                let delay = config.calculate_delay(attempt - 1);
                log::warn!(
                    "attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    err,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
