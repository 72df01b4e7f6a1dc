//! Retry logic with exponential backoff
//!
//! Transient transport failures (timeouts, refused connections, 429 and 5xx
//! answers) are retried with exponential backoff and optional jitter. Every
//! attempt goes back through the request gate, so retries never bypass the
//! minimum request interval.
//!
//! # Example
//!
//! ```no_run
//! use reddit_media_dl::retry::{IsRetryable, with_retry};
//! use reddit_media_dl::config::RetryConfig;
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
//! let cancel = tokio_util::sync::CancellationToken::new();
//! with_retry(&config, &cancel, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => *code == 429 || (500..600).contains(code),
            FetchError::Network(e) => e.is_timeout() || e.is_connect(),
            FetchError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // An empty 200 or a malformed body will not improve on retry
            FetchError::EmptyBody | FetchError::InvalidJson(_) => false,
            FetchError::Cancelled => false,
        }
    }
}

/// Delay schedule of one retried operation
///
/// Yields `max_attempts` delays, each `backoff_multiplier` times the previous
/// one and capped at `max_delay`. With jitter enabled a delay is stretched by
/// up to 100%.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    remaining: u32,
}

impl Backoff {
    /// Schedule for `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            remaining: config.max_attempts,
        }
    }

    /// Wait before the next attempt, `None` once every retry is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.checked_sub(1)?;

        let base = self.next;
        self.next = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier).min(self.max);

        Some(if self.jitter { add_jitter(base) } else { base })
    }
}

/// Run `operation` until it succeeds, fails permanently, or the schedule
/// runs out
///
/// The backoff sleep ends early when `cancel` fires; the next attempt is then
/// expected to observe the cancellation itself and fail.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut attempt = 1u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempts = attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        let Some(delay) = backoff.next_delay() else {
            debug!(error = %err, attempts = attempt, "retries exhausted");
            return Err(err);
        };

        warn!(
            error = %err,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "request failed, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {}
        }
        attempt += 1;
    }
}

fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    delay.mul_f64(1.0 + factor)
}
