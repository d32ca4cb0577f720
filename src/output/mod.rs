//! Output formatting for fitqueue.
//!
//! Formatters for displaying queue contents in pretty or JSON form.

mod json;
mod pretty;

use chrono::{DateTime, Utc};

use crate::cli::args::OutputFormat;
use crate::error::QueueError;
use crate::queue::QueuedRequest;

pub use json::*;
pub use pretty::*;

/// Format pending requests based on output format
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_requests(
    requests: &[QueuedRequest],
    depth: u64,
    format: OutputFormat,
) -> Result<String, QueueError> {
    match format {
        OutputFormat::Pretty => Ok(format_requests_pretty(requests, depth)),
        OutputFormat::Json => format_requests_json(requests, depth),
    }
}

/// Format queue status based on output format
///
/// # Errors
///
/// Returns `QueueError::Parse` if JSON serialization fails.
pub fn format_status(
    depth: u64,
    oldest: Option<DateTime<Utc>>,
    online: bool,
    format: OutputFormat,
) -> Result<String, QueueError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(depth, oldest, online)),
        OutputFormat::Json => format_status_json(depth, oldest, online),
    }
}
