use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use time::Date;

use fillcheck_core::{BarSeries, ProviderId};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Empty,
    InvalidRequest,
    Internal,
}

/// Structured provider error used by gateway fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Empty,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self.kind, SourceErrorKind::Empty)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Empty => "source.empty",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request for one calendar day of minute bars for a provider ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteBarsRequest {
    pub ticker: String,
    pub day: Date,
}

impl MinuteBarsRequest {
    pub fn new(ticker: impl Into<String>, day: Date) -> Result<Self, SourceError> {
        let ticker = ticker.into();
        if ticker.trim().is_empty() {
            return Err(SourceError::invalid_request(
                "minute bars request must name a ticker",
            ));
        }
        Ok(Self { ticker, day })
    }
}

/// OHLC range of the bar covering a requested instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRange {
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    /// Timestamp of the bar the range came from.
    pub bar_ts: fillcheck_core::UtcDateTime,
}

impl MarketRange {
    pub fn from_bar(bar: &fillcheck_core::Bar) -> Self {
        Self {
            low: bar.low,
            high: bar.high,
            open: bar.open,
            close: bar.close,
            bar_ts: bar.ts,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Outcome of consulting one provider during a range lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Empty,
    Error,
    NotAttempted,
}

/// Per-provider status reported on every gateway lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub status: AttemptStatus,
}

impl ProviderAttempt {
    pub const fn new(provider: ProviderId, status: AttemptStatus) -> Self {
        Self { provider, status }
    }
}

/// Historical-price provider contract.
///
/// Implementations must be `Send + Sync`; the gateway shares them across
/// concurrent verification legs.
pub trait MarketSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetch minute bars covering one calendar day for a provider ticker.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure, provider throttling, or
    /// an empty response (`SourceErrorKind::Empty`).
    fn minute_bars<'a>(
        &'a self,
        req: MinuteBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ticker_is_invalid() {
        let day = Date::from_calendar_date(2024, time::Month::March, 1).expect("valid date");
        let err = MinuteBarsRequest::new("  ", day).expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
        assert!(!err.retryable());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(SourceError::unavailable("x").code(), "source.unavailable");
        assert_eq!(SourceError::empty("x").code(), "source.empty");
        assert!(SourceError::rate_limited("x").retryable());
        assert!(!SourceError::invalid_request("x").retryable());
    }
}
