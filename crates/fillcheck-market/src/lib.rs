//! Market data gateway for fillcheck.
//!
//! This crate contains:
//! - The provider adapter contract and the Polygon/Yahoo adapters
//! - The HTTP transport port (reqwest in production, a scripted mock in tests)
//! - Throttling, TTL caching, and bounded retries
//! - The fallback gateway that resolves an instant to an OHLC range

pub mod adapters;
pub mod cache;
pub mod gateway;
pub mod http;
pub mod retry;
pub mod source;
pub mod throttle;

pub use adapters::{PolygonSource, YahooSource};
pub use cache::{CachedRange, RangeCache};
pub use gateway::{MarketDataGateway, RangeLookup};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use retry::RetryPolicy;
pub use source::{
    AttemptStatus, MarketRange, MarketSource, MinuteBarsRequest, ProviderAttempt, SourceError,
    SourceErrorKind,
};
pub use throttle::RateGate;
