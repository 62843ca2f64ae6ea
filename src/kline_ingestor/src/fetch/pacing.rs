//! Minimum spacing between consecutive requests to a source.

use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

/// Lets one request through per `min_interval`; the first goes immediately.
///
/// Waiting is cooperative (`await`), so a paced fetch never blocks the runtime.
pub struct RequestPacer {
    limiter: Option<DefaultDirectRateLimiter>,
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(nonzero!(1u32))));
        Self {
            limiter,
            min_interval,
        }
    }

    /// No spacing at all.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Resolves once the next request may be sent.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn consecutive_requests_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(40));
        let started = Instant::now();
        for _ in 0..3 {
            pacer.ready().await;
        }
        // First request is free, the next two wait one period each.
        assert!(started.elapsed() >= Duration::from_millis(75));
    }

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let pacer = RequestPacer::new(Duration::from_secs(30));
        let started = Instant::now();
        pacer.ready().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_interval_disables_pacing() {
        let pacer = RequestPacer::unpaced();
        assert_eq!(pacer.min_interval(), Duration::ZERO);
        let started = Instant::now();
        for _ in 0..100 {
            pacer.ready().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
