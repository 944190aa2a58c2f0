use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use fillcheck_core::{Bar, BarSeries, ProviderId, UtcDateTime};

use crate::http::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::source::{MarketSource, MinuteBarsRequest, SourceError};

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Secondary provider: the Yahoo Finance v8 chart endpoint.
///
/// No API key and no metered quota; used when Polygon fails or cannot serve
/// the asset class (indices, commodities).
#[derive(Clone)]
pub struct YahooSource {
    http_client: Arc<dyn HttpClient>,
}

impl Default for YahooSource {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::new()),
        }
    }
}

impl YahooSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    async fn fetch_day(&self, req: &MinuteBarsRequest) -> Result<BarSeries, SourceError> {
        let start = req.day.midnight().assume_utc().unix_timestamp();
        let end = start + 86_400;
        let url = format!(
            "{CHART_BASE}/{}?period1={start}&period2={end}&interval=1m&includePrePost=true",
            urlencoding::encode(&req.ticker),
        );
        debug!(ticker = %req.ticker, day = %req.day, "yahoo chart fetch");

        let response = self
            .http_client
            .execute(HttpRequest::get(&url).with_timeout_ms(5_000))
            .await
            .map_err(|e| SourceError::unavailable(format!("yahoo transport error: {}", e.message())))?;

        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "yahoo returned status {}",
                response.status
            )));
        }

        let parsed: ChartResponse = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::internal(format!("failed to parse yahoo response: {e}")))?;

        if let Some(error) = parsed.chart.error {
            return Err(SourceError::unavailable(format!(
                "yahoo chart error: {}",
                error.description.unwrap_or_else(|| error.code.clone())
            )));
        }

        let Some(result) = parsed.chart.result.and_then(|mut r| {
            if r.is_empty() {
                None
            } else {
                Some(r.remove(0))
            }
        }) else {
            return Err(SourceError::empty(format!(
                "yahoo has no chart data for {} on {}",
                req.ticker, req.day
            )));
        };

        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (index, seconds) in timestamps.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                value_at(&quote.open, index),
                value_at(&quote.high, index),
                value_at(&quote.low, index),
                value_at(&quote.close, index),
            ) else {
                // Yahoo pads illiquid minutes with nulls; skip them.
                continue;
            };
            let Ok(ts) = UtcDateTime::from_unix_seconds(*seconds) else {
                continue;
            };
            let volume = value_at(&quote.volume, index).map(|v| v as u64);
            if let Ok(bar) = Bar::new(ts, open, high, low, close, volume) {
                bars.push(bar);
            }
        }

        if bars.is_empty() {
            return Err(SourceError::empty(format!(
                "yahoo has no usable bars for {} on {}",
                req.ticker, req.day
            )));
        }

        Ok(BarSeries::new(req.ticker.clone(), bars))
    }
}

fn value_at<T: Copy>(column: &Option<Vec<Option<T>>>, index: usize) -> Option<T> {
    column.as_ref()?.get(index).copied().flatten()
}

impl MarketSource for YahooSource {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn minute_bars<'a>(
        &'a self,
        req: MinuteBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_day(&req).await })
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}
