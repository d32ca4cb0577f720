//! Network side of the queue.
//!
//! The manager only needs something that can issue an HTTP request and report
//! the status code. [`HttpTransport`] is the reqwest implementation used by the
//! CLI; tests substitute their own [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use super::request::{HttpMethod, QueuedRequest};
use crate::config::ApiConfig;
use crate::error::QueueError;

/// Header carrying the entry id so the server can deduplicate re-deliveries.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A fully built request, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header pairs; names are unique ignoring ASCII case.
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutgoingRequest {
    /// Build the wire request for a queued entry.
    ///
    /// Starts from `Content-Type: application/json`, lets the stored headers
    /// override it, then sets `Idempotency-Key` to the entry id. Only POST,
    /// PUT and PATCH carry the payload.
    #[must_use]
    pub fn from_queued(request: &QueuedRequest) -> Self {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        for (name, value) in &request.headers {
            set_header(&mut headers, name, value);
        }
        set_header(&mut headers, IDEMPOTENCY_HEADER, &request.idempotency_key());

        let body = if request.method.carries_body() {
            request.payload.clone()
        } else {
            None
        };

        Self {
            method: request.method,
            url: request.url.clone(),
            headers,
            body,
        }
    }

    /// Look up a header value, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The idempotency key carried by this request.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.header(IDEMPOTENCY_HEADER)
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

/// Issues a single HTTP request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response status code.
    ///
    /// `Err` means no response was received (connection refused, DNS, TLS...).
    async fn send(&self, request: &OutgoingRequest) -> Result<u16, QueueError>;
}

/// reqwest-backed transport talking to the fitness tracker API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    health_path: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            auth_token: None,
            health_path: "/".to_string(),
        })
    }

    /// Create a transport from the `api` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(api: &ApiConfig) -> Result<Self, QueueError> {
        let mut transport = Self::new(api.base_url.clone(), api.request_timeout())?
            .with_health_path(api.health_path.clone());
        if let Some(token) = api.auth_token.as_deref().filter(|t| !t.is_empty()) {
            transport = transport.with_token(token);
        }
        Ok(transport)
    }

    /// Send `Authorization: Bearer <token>` unless a request sets its own.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Path used by connectivity probes.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Base URL relative urls are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a stored url against the base URL. Absolute urls pass through.
    #[must_use]
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    /// Build the reqwest request for an outgoing queue entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the url or a header cannot be encoded.
    pub fn build_request(&self, request: &OutgoingRequest) -> Result<reqwest::Request, QueueError> {
        let method = match request.method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, self.resolve(&request.url));

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(token) = &self.auth_token {
            if request.header("Authorization").is_none() {
                builder = builder.bearer_auth(token);
            }
        }

        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        builder.build().map_err(|e| {
            QueueError::InvalidRequest(format!("Cannot build request for {}: {e}", request.url))
        })
    }

    /// Issue `GET <base_url><health_path>`; any HTTP response means reachable.
    pub async fn probe(&self) -> bool {
        let url = self.resolve(&self.health_path);
        match self.client.get(&url).send().await {
            Ok(response) => {
                tracing::trace!(%url, status = response.status().as_u16(), "probe answered");
                true
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutgoingRequest) -> Result<u16, QueueError> {
        let built = self.build_request(request)?;
        let response = self
            .client
            .execute(built)
            .await
            .map_err(|e| QueueError::Transport(format!("{} {} failed: {e}", request.method, request.url)))?;

        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::request::Headers;
    use chrono::Utc;
    use serde_json::json;

    fn queued(method: HttpMethod, headers: Headers) -> QueuedRequest {
        QueuedRequest {
            id: 42,
            method,
            url: "/api/logs".to_string(),
            payload: Some(json!({"a": 1})),
            headers,
            enqueued_at: Utc::now(),
            retry_count: 0,
            max_retries: 3,
            last_attempt: None,
            last_error: None,
        }
    }

    fn transport() -> HttpTransport {
        HttpTransport::new("https://fit.example.com/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_default_headers() {
        let outgoing = OutgoingRequest::from_queued(&queued(HttpMethod::Post, Headers::new()));

        assert_eq!(outgoing.header("content-type"), Some("application/json"));
        assert_eq!(outgoing.idempotency_key(), Some("42"));
        assert_eq!(outgoing.body, Some(json!({"a": 1})));
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/merge-patch+json".to_string());
        headers.insert("idempotency-key".to_string(), "spoofed".to_string());
        headers.insert("X-Client".to_string(), "cli".to_string());

        let outgoing = OutgoingRequest::from_queued(&queued(HttpMethod::Patch, headers));

        assert_eq!(outgoing.header("Content-Type"), Some("application/merge-patch+json"));
        assert_eq!(outgoing.idempotency_key(), Some("42"));
        assert_eq!(outgoing.header("x-client"), Some("cli"));
        let content_types = outgoing
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .count();
        assert_eq!(content_types, 1);
    }

    #[test]
    fn test_delete_has_no_body() {
        let outgoing = OutgoingRequest::from_queued(&queued(HttpMethod::Delete, Headers::new()));
        assert!(outgoing.body.is_none());
        assert_eq!(outgoing.idempotency_key(), Some("42"));
    }

    #[test]
    fn test_resolve() {
        let transport = transport();
        assert_eq!(transport.resolve("/api/logs"), "https://fit.example.com/api/logs");
        assert_eq!(transport.resolve("api/logs"), "https://fit.example.com/api/logs");
        assert_eq!(
            transport.resolve("http://other.example.com/x"),
            "http://other.example.com/x"
        );
    }

    #[test]
    fn test_build_request() {
        let transport = transport().with_token("secret");
        let outgoing = OutgoingRequest::from_queued(&queued(HttpMethod::Put, Headers::new()));

        let built = transport.build_request(&outgoing).unwrap();

        assert_eq!(built.method(), &Method::PUT);
        assert_eq!(built.url().as_str(), "https://fit.example.com/api/logs");
        assert_eq!(built.headers()["idempotency-key"], "42");
        assert_eq!(built.headers()["content-type"], "application/json");
        assert_eq!(built.headers()["authorization"], "Bearer secret");
        let body = built.body().and_then(reqwest::Body::as_bytes).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_build_request_keeps_caller_authorization() {
        let transport = transport().with_token("secret");
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "Token abc".to_string());
        let outgoing = OutgoingRequest::from_queued(&queued(HttpMethod::Delete, headers));

        let built = transport.build_request(&outgoing).unwrap();

        assert_eq!(built.headers()["authorization"], "Token abc");
        assert!(built.body().is_none());
    }
}
