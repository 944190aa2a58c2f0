//! Outbound call pacing for quota-limited providers.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Single global token gate in front of a provider's free-tier quota.
///
/// One gate instance protects one provider account, so it is shared across
/// every caller (not keyed by symbol). Callers wait rather than fail:
/// [`RateGate::acquire`] queues until budget is available.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
}

impl RateGate {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
        }
    }

    /// Polygon's free tier: 5 requests per minute.
    pub fn polygon_free_tier() -> Self {
        Self::new(Duration::from_secs(60), 5)
    }

    /// Effectively unlimited; for providers without a metered quota.
    pub fn unmetered() -> Self {
        Self::new(Duration::from_secs(1), 10_000)
    }

    /// Wait until a call slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking probe; true when a slot was consumed.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
