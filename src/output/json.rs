//! JSON output formatting for fitqueue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::QueueError;
use crate::queue::QueuedRequest;

/// Format pending requests as JSON
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_requests_json(requests: &[QueuedRequest], depth: u64) -> Result<String, QueueError> {
    let output = json!({
        "depth": depth,
        "count": requests.len(),
        "items": requests
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format queue status as JSON
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_status_json(
    depth: u64,
    oldest: Option<DateTime<Utc>>,
    online: bool,
) -> Result<String, QueueError> {
    let output = json!({
        "depth": depth,
        "oldest_pending": oldest.map(|t| t.to_rfc3339()),
        "online": online,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Serialize any value as pretty JSON
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, QueueError> {
    Ok(serde_json::to_string_pretty(value)?)
}
