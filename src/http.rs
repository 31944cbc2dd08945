// HTTP JSON fetcher.
// Authenticated GET requests with rate limit tracking, usable as a cache fetcher.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::{Result, SwrError};
use crate::subscription::Fetch;

/// Rate limit state reported by the last response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds at which the quota resets.
    pub reset: u64,
}

/// JSON API client with optional bearer authentication.
pub struct HttpClient {
    client: Client,
    base_url: String,
    rate_limit: Mutex<Option<RateLimit>>,
}

impl HttpClient {
    /// Create a client for `base_url`. Endpoints are appended verbatim.
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers(token)?)
            .build()
            .map_err(SwrError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            rate_limit: Mutex::new(None),
        })
    }

    /// Create a client taking its token from the environment variable `var`.
    pub fn from_env(base_url: impl Into<String>, var: &str) -> Result<Self> {
        let token = std::env::var(var).ok().filter(|t| !t.is_empty());
        Self::new(base_url, token.as_deref())
    }

    /// Rate limit reported by the most recent response, if any.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        *self.rate_limit.lock()
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a GET request.
    pub async fn get(&self, endpoint: &str) -> Result<Response> {
        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(SwrError::Http)?;

        self.update_rate_limit(response.headers());
        self.check_response(response).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<P: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &P,
    ) -> Result<Response> {
        let response = self
            .client
            .get(self.url(endpoint))
            .query(params)
            .send()
            .await
            .map_err(SwrError::Http)?;

        self.update_rate_limit(response.headers());
        self.check_response(response).await
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        debug!(url = %self.url(endpoint), "GET");
        let response = if params.is_empty() {
            self.get(endpoint).await?
        } else {
            self.get_with_params(endpoint, params).await?
        };
        Ok(response.json().await?)
    }

    /// A fetcher that GETs `endpoint` with `params` on every call.
    pub fn fetcher<T>(self: &Arc<Self>, endpoint: impl Into<String>) -> HttpFetcher<T> {
        HttpFetcher {
            client: Arc::clone(self),
            endpoint: endpoint.into(),
            params: Vec::new(),
            _payload: PhantomData,
        }
    }

    fn update_rate_limit(&self, headers: &HeaderMap) {
        if let Some(rate_limit) = parse_rate_limit(headers) {
            *self.rate_limit.lock() = Some(rate_limit);
        }
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, url, self.rate_limit(), body))
    }
}

/// Fetches one endpoint as `T`.
pub struct HttpFetcher<T> {
    client: Arc<HttpClient>,
    endpoint: String,
    params: Vec<(String, String)>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> HttpFetcher<T> {
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> Fetch<T> for HttpFetcher<T> {
    async fn fetch(&self) -> Result<T> {
        self.client.get_json(&self.endpoint, &self.params).await
    }
}

fn default_headers(token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SwrError::Config(format!("invalid token: {e}")))?,
        );
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("swr-cache/", env!("CARGO_PKG_VERSION"))),
    );

    Ok(headers)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Read `x-ratelimit-*` headers. All three must be present.
fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    Some(RateLimit {
        limit: header_u64(headers, "x-ratelimit-limit")?,
        remaining: header_u64(headers, "x-ratelimit-remaining")?,
        reset: header_u64(headers, "x-ratelimit-reset")?,
    })
}

fn status_error(
    status: StatusCode,
    url: String,
    rate_limit: Option<RateLimit>,
    body: String,
) -> SwrError {
    let exhausted = rate_limit.is_some_and(|r| r.remaining == 0);
    match status {
        StatusCode::UNAUTHORIZED => SwrError::Unauthorized,
        StatusCode::NOT_FOUND => SwrError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => SwrError::RateLimited {
            reset_at: reset_display(rate_limit),
        },
        StatusCode::FORBIDDEN if exhausted => SwrError::RateLimited {
            reset_at: reset_display(rate_limit),
        },
        StatusCode::FORBIDDEN => SwrError::Other(format!("Forbidden: {}", body)),
        status => SwrError::Other(format!("HTTP {}: {}", status, body)),
    }
}

fn reset_display(rate_limit: Option<RateLimit>) -> String {
    rate_limit
        .and_then(|r| chrono::DateTime::from_timestamp(r.reset as i64, 0))
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let client = HttpClient::new("https://gitlab.example.com/api/v4", None).unwrap();
        assert_eq!(
            client.url("/projects"),
            "https://gitlab.example.com/api/v4/projects"
        );
        assert!(client.rate_limit().is_none());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = HttpClient::new("https://example.com", Some("bad\ntoken"));
        assert!(matches!(result, Err(SwrError::Config(_))));
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers(Some("abc")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert!(default_headers(None).unwrap().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_parse_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert_eq!(parse_rate_limit(&headers), None);

        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        assert_eq!(
            parse_rate_limit(&headers),
            Some(RateLimit {
                limit: 5000,
                remaining: 0,
                reset: 1_700_000_000,
            })
        );
    }

    #[test]
    fn test_status_mapping() {
        let url = "https://example.com/x".to_string();
        let exhausted = Some(RateLimit {
            limit: 60,
            remaining: 0,
            reset: 0,
        });

        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, url.clone(), None, String::new()),
            SwrError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, url.clone(), None, String::new()),
            SwrError::NotFound(u) if u == url
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, url.clone(), exhausted, String::new()),
            SwrError::RateLimited { reset_at } if reset_at == "00:00:00"
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, url.clone(), None, String::new()),
            SwrError::RateLimited { reset_at } if reset_at == "unknown"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, url.clone(), None, "nope".to_string()),
            SwrError::Other(msg) if msg == "Forbidden: nope"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, url, None, String::new()),
            SwrError::Other(msg) if msg.starts_with("HTTP 502")
        ));
    }

    #[test]
    fn test_fetcher_params() {
        let client = Arc::new(HttpClient::new("https://example.com", None).unwrap());
        let fetcher: HttpFetcher<serde_json::Value> =
            client.fetcher("/events").param("action", "pushed").param("page", 2);
        assert_eq!(fetcher.endpoint(), "/events");
        assert_eq!(
            fetcher.params(),
            &[
                ("action".to_string(), "pushed".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
    }
}
