//! HTTP transport port used by provider adapters.
//!
//! Adapters never talk to `reqwest` directly; they issue [`HttpRequest`]s
//! through the [`HttpClient`] trait so tests can swap in the deterministic
//! [`MockHttpClient`].

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Outgoing GET request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 5_000,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract for provider adapters.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production transport built on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent("fillcheck/0.1.0")
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = builder.timeout(std::time::Duration::from_millis(request.timeout_ms));

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Scripted transport for offline tests: routes are matched by URL
/// substring, in registration order. Unmatched requests fail.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<(String, Result<HttpResponse, HttpError>)>>,
    requests: Mutex<Vec<String>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url_fragment: impl Into<String>, response: HttpResponse) -> Self {
        self.routes
            .lock()
            .expect("mock route table lock should not be poisoned")
            .push((url_fragment.into(), Ok(response)));
        self
    }

    pub fn fail(self, url_fragment: impl Into<String>, error: HttpError) -> Self {
        self.routes
            .lock()
            .expect("mock route table lock should not be poisoned")
            .push((url_fragment.into(), Err(error)));
        self
    }

    /// URLs of every request executed, in order.
    pub fn seen_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("mock request log lock should not be poisoned")
            .clone()
    }
}

impl HttpClient for MockHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests
                .lock()
                .expect("mock request log lock should not be poisoned")
                .push(request.url.clone());

            let routes = self
                .routes
                .lock()
                .expect("mock route table lock should not be poisoned");
            for (fragment, outcome) in routes.iter() {
                if request.url.contains(fragment.as_str()) {
                    return outcome.clone();
                }
            }
            Err(HttpError::non_retryable(format!(
                "no mock route matches '{}'",
                request.url
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_routes_match_by_substring() {
        let client = MockHttpClient::new()
            .respond("aggs/ticker", HttpResponse::ok_json(r#"{"results":[]}"#))
            .fail("finance/chart", HttpError::new("boom"));

        let hit = client
            .execute(HttpRequest::get("https://api.polygon.io/v2/aggs/ticker/AAPL"))
            .await
            .expect("route should match");
        assert!(hit.is_success());

        let miss = client
            .execute(HttpRequest::get("https://example.test/other"))
            .await
            .expect_err("unmatched request must fail");
        assert!(!miss.retryable());

        assert_eq!(client.seen_urls().len(), 2);
    }

    #[test]
    fn headers_are_lowercased() {
        let request = HttpRequest::get("https://example.test").with_header("X-Api-Key", "k");
        assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("k"));
    }
}
