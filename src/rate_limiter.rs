//! Minimum-interval request gate
//!
//! Every outbound request (listing pages, provider metadata, media bytes) passes
//! through one shared [`RequestGate`] before it is sent. The default
//! [`IntervalLimiter`] guarantees that the start times of any two requests are at
//! least `min_interval` apart.
//!
//! The gate holds its lock for the whole wait, so concurrent callers queue up
//! behind each other instead of computing the same free slot. The timestamp is
//! recorded *before* the caller is released, which means nothing can race past
//! the throttle between the check and the send.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Something that decides when the next outbound request may start
///
/// Resolvers and the transport only see this trait, so a different pacing
/// strategy (token bucket, per-host limits) can be swapped in without touching
/// provider logic.
#[async_trait]
pub trait RequestGate: Send + Sync {
    /// Wait until a request may start and reserve that start time
    async fn acquire(&self);
}

/// Global minimum-interval limiter
///
/// Measures gaps with a monotonic wall clock ([`std::time::Instant`]), not with
/// scheduled or virtual time.
///
/// # Examples
///
/// ```
/// use reddit_media_dl::rate_limiter::{IntervalLimiter, RequestGate};
/// use std::time::Duration;
///
/// # async fn example() {
/// let limiter = IntervalLimiter::new(Duration::from_millis(2000));
/// limiter.acquire().await; // first request goes immediately
/// limiter.acquire().await; // second waits ~2s
/// # }
/// ```
#[derive(Debug)]
pub struct IntervalLimiter {
    /// Minimum gap between two request starts
    min_interval: Duration,
    /// Start time of the last released request
    last_request: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    /// Create a limiter with the given minimum interval (zero disables waiting)
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// The configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Start time of the most recently released request, if any
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

#[async_trait]
impl RequestGate for IntervalLimiter {
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::trace!(wait_ms = wait.as_millis() as u64, "throttling request");
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}
