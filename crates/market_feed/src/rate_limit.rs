//! Rate limiter for the chart API.
//!
//! The public chart endpoint throttles bursts, so outgoing requests share
//! one token bucket.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create with a per-second request limit. Zero is treated as one.
    pub fn per_second(requests_per_sec: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_sec).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(GovLimiter::direct(Quota::per_second(rate))),
        }
    }

    /// Wait until a request slot is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a slot without waiting. Returns true if acquired.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_bounded_by_quota() {
        let rl = RateLimiter::per_second(2);
        assert!(rl.try_acquire());
        assert!(rl.try_acquire());
        assert!(!rl.try_acquire(), "third request in the same second should wait");
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let rl = RateLimiter::per_second(0);
        assert!(rl.try_acquire());
    }
}
