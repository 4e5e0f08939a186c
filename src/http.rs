//! Outbound HTTP for feedhub.
//!
//! Every network call made by the engine goes through the [`HttpClient`]
//! trait. The production implementation wraps `reqwest` with timeouts, a
//! redirect limit, a response size limit and a per-host throttle.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::FetchConfig;
use crate::{FeedhubError, Result};

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL after redirects.
    pub url: String,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with a fetch error unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FeedhubError::Fetch(format!(
                "HTTP error: {} for {}",
                self.status, self.url
            )))
        }
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| FeedhubError::Fetch(format!("invalid JSON from {}: {}", self.url, e)))
    }
}

/// HTTP GET abstraction injected into the engine.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and read the whole body.
    ///
    /// Transport failures are errors; non-2xx statuses are returned as-is.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// GET a URL and return its body as text, failing on non-2xx.
pub async fn get_text(client: &dyn HttpClient, url: &str) -> Result<String> {
    let response = client.get(url).await?.error_for_status()?;
    Ok(response.text())
}

/// GET a URL and decode its body as JSON, failing on non-2xx.
pub async fn get_json<T: DeserializeOwned>(client: &dyn HttpClient, url: &str) -> Result<T> {
    let response = client.get(url).await?.error_for_status()?;
    response.json()
}

type HostRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Concurrency cap and rate limiter shared by all requests to one host.
struct HostGate {
    semaphore: Arc<Semaphore>,
    limiter: HostRateLimiter,
}

/// Per-host throttle: a semaphore caps in-flight requests and a governor
/// limiter caps the request rate.
pub struct HostThrottle {
    hosts: Mutex<HashMap<String, Arc<HostGate>>>,
    max_in_flight: usize,
    requests_per_minute: u32,
}

impl HostThrottle {
    /// Create a throttle with the given per-host limits.
    pub fn new(max_in_flight: usize, requests_per_minute: u32) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            max_in_flight: max_in_flight.max(1),
            requests_per_minute,
        }
    }

    fn gate(&self, host: &str) -> Arc<HostGate> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                let quota = Quota::per_minute(
                    NonZeroU32::new(self.requests_per_minute).unwrap_or(NonZeroU32::MIN),
                );
                Arc::new(HostGate {
                    semaphore: Arc::new(Semaphore::new(self.max_in_flight)),
                    limiter: RateLimiter::direct(quota),
                })
            })
            .clone()
    }

    /// Wait for a slot on the given host.
    ///
    /// The returned permit must be held for the duration of the request.
    pub async fn acquire(&self, host: &str) -> Result<OwnedSemaphorePermit> {
        let gate = self.gate(host);
        let permit = gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| FeedhubError::Fetch(format!("host throttle closed: {e}")))?;
        gate.limiter.until_ready().await;
        Ok(permit)
    }

    /// Number of hosts seen so far.
    pub fn host_count(&self) -> usize {
        self.hosts.lock().map(|h| h.len()).unwrap_or(0)
    }
}

/// Production HTTP client backed by `reqwest`.
pub struct ReqwestClient {
    client: Client,
    throttle: HostThrottle,
    max_body_size: u64,
}

impl ReqwestClient {
    /// Build a client from fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedhubError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            throttle: HostThrottle::new(
                config.per_host_concurrency,
                config.per_host_requests_per_minute,
            ),
            max_body_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let parsed =
            url::Url::parse(url).map_err(|e| FeedhubError::Fetch(format!("invalid URL: {}", e)))?;
        let host = parsed.host_str().unwrap_or_default().to_lowercase();

        let _permit = self.throttle.acquire(&host).await?;
        debug!("GET {}", url);

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FeedhubError::Fetch(format!("request to {} failed: {}", url, e)))?;

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_body_size {
                return Err(FeedhubError::Fetch(format!(
                    "response too large: {} bytes (max {} bytes)",
                    content_length, self.max_body_size
                )));
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FeedhubError::Fetch(format!("failed to read response: {}", e)))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_size {
                return Err(FeedhubError::Fetch(format!(
                    "response too large (max {} bytes)",
                    self.max_body_size
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

/// Canned response served by [`StubHttpClient`].
#[derive(Debug, Clone)]
enum StubRoute {
    Respond { status: u16, body: Vec<u8> },
    Fail(String),
}

/// In-memory [`HttpClient`] serving canned responses keyed by exact URL.
///
/// Unknown URLs fail with a fetch error. Every request is recorded.
#[derive(Default)]
pub struct StubHttpClient {
    routes: Mutex<HashMap<String, StubRoute>>,
    requests: Mutex<Vec<String>>,
}

impl StubHttpClient {
    /// Create an empty stub.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, url: &str, route: StubRoute) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), route);
    }

    /// Serve `body` with status 200 for `url`.
    pub fn respond(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.respond_with_status(url, 200, body)
    }

    /// Serve `body` with the given status for `url`.
    pub fn respond_with_status(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.insert(
            url,
            StubRoute::Respond {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Fail requests to `url` with a transport error.
    pub fn fail(&self, url: &str, message: &str) -> &Self {
        self.insert(url, StubRoute::Fail(message.to_string()));
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests made to `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == url).count()
    }
}

#[async_trait]
impl HttpClient for StubHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());

        let route = self
            .routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned();

        match route {
            Some(StubRoute::Respond { status, body }) => Ok(HttpResponse {
                status,
                url: url.to_string(),
                body,
            }),
            Some(StubRoute::Fail(message)) => Err(FeedhubError::Fetch(message)),
            None => Err(FeedhubError::Fetch(format!("no route for {}", url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_serves_routes() {
        let stub = StubHttpClient::new();
        stub.respond("https://example.com/a", "hello");
        stub.respond_with_status("https://example.com/b", 404, "missing");
        stub.fail("https://example.com/c", "connection reset");

        let a = stub.get("https://example.com/a").await.unwrap();
        assert!(a.is_success());
        assert_eq!(a.text(), "hello");

        let b = stub.get("https://example.com/b").await.unwrap();
        assert_eq!(b.status, 404);
        assert!(b.error_for_status().is_err());

        let c = stub.get("https://example.com/c").await;
        assert!(matches!(c, Err(FeedhubError::Fetch(msg)) if msg == "connection reset"));

        assert!(stub.get("https://example.com/unknown").await.is_err());
        assert_eq!(stub.requests().len(), 4);
        assert_eq!(stub.request_count("https://example.com/a"), 1);
    }

    #[tokio::test]
    async fn test_get_text_and_json_helpers() {
        let stub = StubHttpClient::new();
        stub.respond("https://example.com/j", r#"{"score": 12}"#);
        stub.respond_with_status("https://example.com/e", 500, "oops");

        let value: serde_json::Value = get_json(&stub, "https://example.com/j").await.unwrap();
        assert_eq!(value["score"], 12);

        assert!(get_text(&stub, "https://example.com/e").await.is_err());
    }

    #[test]
    fn test_invalid_json_is_fetch_error() {
        let response = HttpResponse {
            status: 200,
            url: "https://example.com".to_string(),
            body: b"not json".to_vec(),
        };
        let result: Result<serde_json::Value> = response.json();
        assert!(matches!(result, Err(FeedhubError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_host_throttle_caps_in_flight() {
        let throttle = HostThrottle::new(1, 600);
        let first = throttle.acquire("www.reddit.com").await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            throttle.acquire("www.reddit.com"),
        )
        .await;
        assert!(blocked.is_err());

        // A different host is independent.
        let other = throttle.acquire("bsky.app").await.unwrap();
        assert_eq!(throttle.host_count(), 2);

        drop(first);
        drop(other);
        assert!(throttle.acquire("www.reddit.com").await.is_ok());
    }

    #[test]
    fn test_reqwest_client_builds_from_default_config() {
        assert!(ReqwestClient::new(&FetchConfig::default()).is_ok());
    }
}
