//! Retry policies and retry loops
//!
//! Two shapes of waiting live here:
//! - [`RetryPolicy`] delays, used by the login poll loop (fixed interval) and
//!   available to callers that schedule their own attempts
//! - [`with_retry`], an exponential backoff loop with optional jitter for
//!   transient connection failures
//!
//! # Example
//!
//! ```no_run
//! use teletv::retry::{IsRetryable, with_retry};
//! use teletv::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{RetryConfig, RetryPolicy};
use crate::error::{Error, TransportError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, dropped connections, flood limits) return `true`.
/// Permanent failures (bad credentials, corrupt configuration) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_)
            | TransportError::Disconnected(_)
            | TransportError::Timeout => true,
            // 420 FLOOD_WAIT and server-side failures clear up on their own
            TransportError::Rpc { code, .. } => *code == 420 || *code >= 500,
            // A broken chunk reader is restarted by the user, not automatically
            TransportError::StreamInterrupted { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::Interrupted
            ),
            Error::NotConnected => true,
            Error::Config { .. }
            | Error::Acquisition(_)
            | Error::Login(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::UnknownScreen(_)
            | Error::ShuttingDown => false,
        }
    }
}

impl RetryPolicy {
    /// Fixed-interval policy
    pub fn fixed(delay: Duration) -> Self {
        RetryPolicy::Fixed { delay }
    }

    /// Delay before attempt number `attempt` (1-based; 0 is treated as 1)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::Fixed { delay } => *delay,
            RetryPolicy::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(63) as i32;
                let secs = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                // Capped before conversion; NaN and infinity collapse to the cap as well
                let capped = secs.min(max_delay.as_secs_f64());
                Duration::try_from_secs_f64(capped).unwrap_or(*max_delay)
            }
        }
    }

    /// Whether the policy would never wait at all
    pub fn is_zero(&self) -> bool {
        match self {
            RetryPolicy::Fixed { delay } => delay.is_zero(),
            RetryPolicy::Exponential { initial_delay, .. } => initial_delay.is_zero(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::Exponential {
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first
///
/// Returns `false` when the wait was cut short by cancellation.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result, the first non-retryable error, or the last
/// error after `config.max_attempts` retries.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let policy = RetryPolicy::from(config);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let delay = policy.delay(attempt);

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let delay = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
