//! Network access for the cache worker.

use super::CacheError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Whether a response came from the asset origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response.
    Cors,
}

/// A request routed through the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: String,
    pub url: Url,
    /// The request loads a page (document) rather than a subresource.
    pub navigate: bool,
}

impl CacheRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            navigate: false,
        }
    }

    pub fn navigation(url: Url) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A response as the cache stores and returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Cacheable on the fetch path: exactly 200 and same-origin.
    pub fn cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError>;
}

/// Network backed by a `reqwest` client.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    /// Every request, body included, is bounded by `timeout`.
    pub fn new(origin: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Self::client_builder(timeout).build()?;
        Ok(Self { client, origin })
    }

    fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(format!("webmaster/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        let fail = |reason: String| CacheError::Network {
            url: request.url.to_string(),
            reason,
        };

        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| fail(e.to_string()))?;

        debug!("{} {}", method, request.url);
        let response = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let response_type = if url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| fail(e.to_string()))?
            .to_vec();

        Ok(CachedResponse {
            url: url.to_string(),
            status,
            headers,
            response_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::tests::{http_response, serve};

    fn response(status: u16, response_type: ResponseType) -> CachedResponse {
        CachedResponse {
            url: "https://example.com/".to_string(),
            status,
            headers: Vec::new(),
            response_type,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_cacheable_needs_200_and_basic() {
        assert!(response(200, ResponseType::Basic).cacheable());
        assert!(!response(200, ResponseType::Cors).cacheable());
        assert!(!response(204, ResponseType::Basic).cacheable());
        assert!(response(204, ResponseType::Basic).ok());
        assert!(!response(404, ResponseType::Basic).ok());
    }

    #[test]
    fn test_request_method_check() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(CacheRequest::get(url.clone()).is_get());
        assert!(CacheRequest::navigation(url.clone()).navigate);

        let post = CacheRequest {
            method: "post".to_string(),
            url,
            navigate: false,
        };
        assert!(!post.is_get());
    }

    #[tokio::test]
    async fn test_http_network_classifies_origin() {
        let addr = serve(
            http_response("200 OK", &[("Content-Type", "text/plain")], "asset"),
            Duration::ZERO,
        )
        .await;
        let origin = Url::parse(&format!("http://{}/", addr)).unwrap();
        let network = HttpNetwork {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            origin: origin.clone(),
        };

        let fetched = network
            .fetch(&CacheRequest::get(origin.join("/app.js").unwrap()))
            .await
            .unwrap();
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.response_type, ResponseType::Basic);
        assert_eq!(fetched.body, b"asset");

        let other = HttpNetwork {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            origin: Url::parse("https://static.example.com/").unwrap(),
        };
        let fetched = other
            .fetch(&CacheRequest::get(origin.join("/app.js").unwrap()))
            .await
            .unwrap();
        assert_eq!(fetched.response_type, ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_http_network_gives_up_on_slow_origin() {
        let addr = serve(
            http_response("200 OK", &[], "late"),
            Duration::from_secs(3),
        )
        .await;
        let origin = Url::parse(&format!("http://{}/", addr)).unwrap();
        let network = HttpNetwork {
            client: HttpNetwork::client_builder(Duration::from_millis(200))
                .no_proxy()
                .build()
                .unwrap(),
            origin: origin.clone(),
        };

        let started = std::time::Instant::now();
        let err = network
            .fetch(&CacheRequest::get(origin.join("/app.js").unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Network { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
