//! Historical range lookups with provider fallback.
//!
//! One lookup walks the ordered provider list: per-provider cache probe,
//! then a bounded-retry fetch of the calendar day at minute resolution,
//! then the bar closest to the requested instant. The first provider that
//! produces a range wins; every provider consulted leaves an attempt status
//! behind for the verification report.

use std::sync::Arc;

use tracing::{debug, warn};

use fillcheck_core::{NormalizedSymbol, ProviderId, UtcDateTime};

use crate::adapters::{PolygonSource, YahooSource};
use crate::cache::{CachedRange, RangeCache};
use crate::retry::RetryPolicy;
use crate::source::{
    AttemptStatus, MarketRange, MarketSource, MinuteBarsRequest, ProviderAttempt, SourceError,
};

/// Result of one range lookup: the range (if any provider had data), which
/// provider produced it, and the status of every provider consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeLookup {
    pub range: Option<MarketRange>,
    pub provider: Option<ProviderId>,
    pub attempts: Vec<ProviderAttempt>,
}

impl RangeLookup {
    pub fn found(&self) -> bool {
        self.range.is_some()
    }
}

/// Market data gateway: ordered provider adapters behind one interface,
/// with a shared read-through cache and bounded retries.
pub struct MarketDataGateway {
    sources: Vec<Arc<dyn MarketSource>>,
    cache: RangeCache,
    retry: RetryPolicy,
}

impl Default for MarketDataGateway {
    fn default() -> Self {
        Self::new(
            vec![
                Arc::new(PolygonSource::default()),
                Arc::new(YahooSource::default()),
            ],
            RangeCache::with_default_ttls(),
            RetryPolicy::default(),
        )
    }
}

impl MarketDataGateway {
    pub fn new(sources: Vec<Arc<dyn MarketSource>>, cache: RangeCache, retry: RetryPolicy) -> Self {
        Self {
            sources,
            cache,
            retry,
        }
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    /// OHLC range covering `instant` for a normalized symbol.
    pub async fn range_at(&self, symbol: &NormalizedSymbol, instant: UtcDateTime) -> RangeLookup {
        let mut attempts = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let provider = source.id();
            let Some(ticker) = symbol.provider_symbol(provider) else {
                attempts.push(ProviderAttempt::new(provider, AttemptStatus::NotAttempted));
                continue;
            };

            let key = RangeCache::key(provider, &ticker, instant);
            if let Some(cached) = self.cache.get(&key).await {
                debug!(%provider, ticker, "range cache hit");
                attempts.push(ProviderAttempt::new(provider, AttemptStatus::Success));
                return RangeLookup {
                    range: Some(cached.range),
                    provider: Some(cached.provider),
                    attempts,
                };
            }

            let request = match MinuteBarsRequest::new(ticker.clone(), instant.date()) {
                Ok(request) => request,
                Err(error) => {
                    warn!(%provider, ticker, %error, "invalid provider request");
                    attempts.push(ProviderAttempt::new(provider, AttemptStatus::Error));
                    continue;
                }
            };

            match self.fetch_with_retry(source.as_ref(), request).await {
                Ok(series) => {
                    let Some(bar) = series.closest_to(instant) else {
                        attempts.push(ProviderAttempt::new(provider, AttemptStatus::Empty));
                        continue;
                    };
                    let range = MarketRange::from_bar(bar);
                    self.cache
                        .put(key, CachedRange { range, provider }, instant)
                        .await;
                    attempts.push(ProviderAttempt::new(provider, AttemptStatus::Success));
                    return RangeLookup {
                        range: Some(range),
                        provider: Some(provider),
                        attempts,
                    };
                }
                Err(error) if error.is_empty() => {
                    debug!(%provider, %error, "provider has no data, falling back");
                    attempts.push(ProviderAttempt::new(provider, AttemptStatus::Empty));
                }
                Err(error) => {
                    warn!(%provider, %error, "provider failed, falling back");
                    attempts.push(ProviderAttempt::new(provider, AttemptStatus::Error));
                }
            }
        }

        RangeLookup {
            range: None,
            provider: None,
            attempts,
        }
    }

    async fn fetch_with_retry(
        &self,
        source: &dyn MarketSource,
        request: MinuteBarsRequest,
    ) -> Result<fillcheck_core::BarSeries, SourceError> {
        let mut attempt = 0;
        loop {
            match source.minute_bars(request.clone()).await {
                Ok(series) => return Ok(series),
                Err(error) if error.retryable() && self.retry.allows_retry(attempt) => {
                    debug!(
                        provider = %source.id(),
                        attempt,
                        %error,
                        "retrying provider call after fixed backoff"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
