//! Retry logic with a fixed delay
//!
//! Every network hop in a harvest is wrapped in a bounded retry loop: the
//! operation is attempted up to `max_attempts` times in total, sleeping a fixed
//! delay between attempts. Only errors classified as transient by
//! [`IsRetryable`] are retried; everything else is returned on first failure.
//!
//! # Example
//!
//! ```no_run
//! use kb_harvest::retry::{IsRetryable, with_retry};
//! use kb_harvest::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
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
//! let result = with_retry(&config, "example", || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, MediaError};
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, server errors) should return `true`.
/// Permanent failures (missing markup, unavailable video, local write errors) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Returns true for I/O error kinds that indicate a transient transport problem
pub(crate) fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
    )
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures: timeouts, refused connections, truncated bodies
            Error::Network(e) => !e.is_builder(),
            Error::Io(e) => is_transient_io(e),
            // HTTP error statuses and redirect loops share the same bounded budget
            Error::Protocol(_) => true,
            Error::Media(MediaError::Transient { .. }) => true,
            Error::Media(_) => false,
            Error::Content(_) => false,
            Error::Config { .. } => false,
            Error::Archive(_) => false,
            Error::Serialization(_) => false,
            Error::InvalidUrl(_) => false,
            Error::ExternalTool(_) => false,
            Error::NotSupported(_) => false,
            Error::Fatal(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with a bounded, fixed-delay retry loop
///
/// # Arguments
///
/// * `config` - Retry configuration (total attempts, delay between attempts)
/// * `what` - Label for the operation, recorded in log fields (usually a URL or locator)
/// * `operation` - Async closure that returns Result<T, E> where E implements IsRetryable
///
/// # Returns
///
/// Returns the successful result or the last error after all attempts are exhausted.
/// A `max_attempts` of zero still runs the operation once.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(target_ref = what, attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    target_ref = what,
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = config.delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        target_ref = what,
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        target_ref = what,
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}
