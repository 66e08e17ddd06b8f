//! HTTP fetch capability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{CollectError, CollectResult};

/// Raw response of a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error.
    pub fn error_for_status(self, url: &str) -> CollectResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CollectError::HttpStatus {
                status: self.status,
                url: url.to_string(),
            })
        }
    }
}

/// Trait for anything that can perform a bounded HTTP GET.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url`, giving up after `timeout`.
    ///
    /// Non-2xx statuses are returned as a response, not as an error; only
    /// transport failures and timeouts are errors.
    async fn get(&self, url: &str, timeout: Duration) -> CollectResult<HttpResponse>;
}

/// [`HttpFetcher`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Create a fetcher with its own client.
    pub fn new() -> CollectResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("ratekeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CollectError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> CollectResult<HttpResponse> {
        debug!(url, timeout_secs = timeout.as_secs(), "HTTP GET");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CollectError::from_reqwest(url, e, timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CollectError::from_reqwest(url, e, timeout))?;

        debug!(url, status, bytes = body.len(), "HTTP response received");
        Ok(HttpResponse { status, body })
    }
}

/// Canned behaviour of a [`StaticFetcher`] route.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub enum CannedResponse {
    /// Answer with this status and body.
    Respond { status: u16, body: String },
    /// Fail as if the connection was refused.
    Refuse,
    /// Fail as if the request timed out.
    Hang,
}

/// In-memory fetcher for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: dashmap::DashMap<String, CannedResponse>,
    hits: dashmap::DashMap<String, usize>,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticFetcher {
    /// Create a fetcher with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    pub fn with_ok(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.set(
            url,
            CannedResponse::Respond {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    /// Install a canned response for `url`.
    pub fn set(&self, url: impl Into<String>, response: CannedResponse) {
        self.routes.insert(url.into(), response);
    }

    /// Number of requests made to `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.get(url).map(|h| *h).unwrap_or(0)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> CollectResult<HttpResponse> {
        *self.hits.entry(url.to_string()).or_insert(0) += 1;

        let canned = self.routes.get(url).map(|r| r.clone());
        match canned {
            Some(CannedResponse::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(CannedResponse::Hang) => Err(CollectError::timeout(format!("GET {}", url), timeout)),
            Some(CannedResponse::Refuse) | None => Err(CollectError::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}
