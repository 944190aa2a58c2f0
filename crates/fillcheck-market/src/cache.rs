//! Read-through TTL cache for market ranges.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fillcheck_core::{ProviderId, UtcDateTime};

use crate::source::MarketRange;

/// A cached range together with the provider that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedRange {
    pub range: MarketRange,
    pub provider: ProviderId,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: CachedRange,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
}

/// Thread-safe TTL cache keyed by `provider:ticker:minute-bucket`.
///
/// TTLs are a staleness bound, not a correctness requirement: a closed
/// historical bar never changes, so it gets the long TTL; a bar still inside
/// the current minute gets the short one.
#[derive(Debug, Clone)]
pub struct RangeCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
    live_ttl: Duration,
    historical_ttl: Duration,
}

impl RangeCache {
    pub fn new(live_ttl: Duration, historical_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
            })),
            live_ttl,
            historical_ttl,
        }
    }

    /// Defaults: 20 s for live bars, 15 min for closed historical bars.
    pub fn with_default_ttls() -> Self {
        Self::new(Duration::from_secs(20), Duration::from_secs(900))
    }

    /// Cache key for a provider ticker at a minute bucket.
    pub fn key(provider: ProviderId, ticker: &str, instant: UtcDateTime) -> String {
        format!("{}:{}:{}", provider, ticker, instant.minute_bucket())
    }

    pub async fn get(&self, key: &str) -> Option<CachedRange> {
        let store = self.inner.read().await;
        store.map.get(key).and_then(|entry| {
            if Instant::now() <= entry.expires_at {
                Some(entry.value)
            } else {
                None
            }
        })
    }

    /// Insert a range, picking the TTL from how old the bar is: anything
    /// older than two minutes is a closed bar.
    pub async fn put(&self, key: String, value: CachedRange, now: UtcDateTime) {
        let age_seconds = now.distance_seconds(value.range.bar_ts);
        let ttl = if age_seconds >= 120 {
            self.historical_ttl
        } else {
            self.live_ttl
        };

        let mut store = self.inner.write().await;
        store.map.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn clear_expired(&self) {
        let now = Instant::now();
        let mut store = self.inner.write().await;
        store.map.retain(|_, entry| entry.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.map.len()
    }
}
