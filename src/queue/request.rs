//! Request descriptors for the offline queue.
//!
//! A [`NewRequest`] is what callers hand to the queue; the store turns it
//! into a [`QueuedRequest`] by assigning an id.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueueError;

/// Default number of attempts before a request is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Extra headers stored with a request, merged with defaults at send time.
pub type Headers = BTreeMap<String, String>;

/// The mutating HTTP verbs the queue accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a JSON payload is sent as the request body.
    #[must_use]
    pub const fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(QueueError::InvalidRequest(format!(
                "Unsupported method '{other}' (expected POST, PUT, PATCH or DELETE)"
            ))),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub method: HttpMethod,
    pub url: String,
    pub payload: Option<Value>,
    pub headers: Headers,
    pub enqueued_at: DateTime<Utc>,
    pub max_retries: u32,
}

impl NewRequest {
    /// Create a request with no payload and no extra headers.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into().trim().to_string(),
            payload: None,
            headers: Headers::new(),
            enqueued_at: Utc::now(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the JSON body.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Add an extra header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check the descriptor before it is persisted.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidRequest` for an empty url, a zero retry
    /// ceiling, or a header that is not a valid HTTP header.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.url.trim().is_empty() {
            return Err(QueueError::InvalidRequest(
                "url must not be empty".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(QueueError::InvalidRequest(
                "max_retries must be at least 1".to_string(),
            ));
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                QueueError::InvalidRequest(format!("Invalid header name '{name}'"))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                QueueError::InvalidRequest(format!("Invalid value for header '{name}'"))
            })?;
        }

        Ok(())
    }
}

/// A persisted request waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Store-assigned id, also used as the idempotency key.
    pub id: i64,
    pub method: HttpMethod,
    pub url: String,
    pub payload: Option<Value>,
    pub headers: Headers,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Time of the most recent failed attempt.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
}

impl QueuedRequest {
    /// Idempotency key presented on every delivery attempt of this entry.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        self.id.to_string()
    }

    /// Whether the retry budget is used up.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Attempts left before the entry is dropped.
    #[must_use]
    pub const fn attempts_remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }

    /// Count a failed attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}
