use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use fillcheck_core::{Bar, BarSeries, ProviderId, UtcDateTime};

use crate::http::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::source::{MarketSource, MinuteBarsRequest, SourceError};
use crate::throttle::RateGate;

const AGGS_BASE: &str = "https://api.polygon.io/v2/aggs/ticker";

/// Primary provider: Polygon minute aggregates.
///
/// The free tier allows 5 requests per minute, so every call goes through a
/// shared [`RateGate`] and queues when the quota is exhausted.
#[derive(Clone)]
pub struct PolygonSource {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    gate: RateGate,
}

impl Default for PolygonSource {
    fn default() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::new()),
            api_key: std::env::var("FILLCHECK_POLYGON_API_KEY")
                .unwrap_or_else(|_| String::from("demo")),
            gate: RateGate::polygon_free_tier(),
        }
    }
}

impl PolygonSource {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_gate(mut self, gate: RateGate) -> Self {
        self.gate = gate;
        self
    }

    async fn fetch_day(&self, req: &MinuteBarsRequest) -> Result<BarSeries, SourceError> {
        self.gate.acquire().await;

        let url = format!(
            "{AGGS_BASE}/{}/range/1/minute/{day}/{day}?adjusted=true&sort=asc&limit=50000&apiKey={key}",
            urlencoding::encode(&req.ticker),
            day = req.day,
            key = self.api_key,
        );
        debug!(ticker = %req.ticker, day = %req.day, "polygon minute aggregates fetch");

        let response = self
            .http_client
            .execute(HttpRequest::get(&url).with_timeout_ms(5_000))
            .await
            .map_err(|e| SourceError::unavailable(format!("polygon transport error: {}", e.message())))?;

        if response.status == 429 {
            return Err(SourceError::rate_limited("polygon free-tier limit exceeded"));
        }
        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "polygon returned status {}",
                response.status
            )));
        }

        let parsed: AggsResponse = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::internal(format!("failed to parse polygon response: {e}")))?;

        let rows = parsed.results.unwrap_or_default();
        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(ts) = UtcDateTime::from_unix_millis(row.t) else {
                continue;
            };
            // Malformed rows are skipped, not fatal.
            if let Ok(bar) = Bar::new(ts, row.o, row.h, row.l, row.c, row.v.map(|v| v as u64)) {
                bars.push(bar);
            }
        }

        if bars.is_empty() {
            return Err(SourceError::empty(format!(
                "polygon has no minute bars for {} on {}",
                req.ticker, req.day
            )));
        }

        Ok(BarSeries::new(req.ticker.clone(), bars))
    }
}

impl MarketSource for PolygonSource {
    fn id(&self) -> ProviderId {
        ProviderId::Polygon
    }

    fn minute_bars<'a>(
        &'a self,
        req: MinuteBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_day(&req).await })
    }
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    results: Option<Vec<AggRow>>,
}

#[derive(Debug, Deserialize)]
struct AggRow {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: Option<f64>,
}
