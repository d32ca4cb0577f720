//! Queue command implementations.

use colored::Colorize;
use serde_json::{json, Value};
use tracing::debug;

use super::QueueContext;
use crate::cli::args::OutputFormat;
use crate::error::QueueError;
use crate::output::{format_requests, format_status, to_json};
use crate::queue::{format_flush_report, Headers, HttpMethod, NewRequest, SyncTrigger};

/// Persist a request, then flush if the backend is reachable.
///
/// # Errors
///
/// Returns an error for an unsupported method, a payload that is not JSON,
/// an invalid header, or a storage failure.
pub async fn enqueue(
    ctx: &QueueContext,
    method: &str,
    url: &str,
    data: Option<&str>,
    headers: Vec<(String, String)>,
    no_flush: bool,
    format: OutputFormat,
) -> Result<String, QueueError> {
    let method: HttpMethod = method.parse()?;

    let mut request = NewRequest::new(method, url);
    if let Some(data) = data {
        let payload: Value = serde_json::from_str(data)
            .map_err(|e| QueueError::InvalidRequest(format!("Payload is not valid JSON: {e}")))?;
        request = request.with_payload(payload);
    }
    request.headers = headers.into_iter().collect::<Headers>();

    let id = ctx.manager(false).enqueue(request).await?;

    let report = if no_flush {
        None
    } else if ctx.probe().await {
        Some(ctx.manager(true).flush(SyncTrigger::Enqueued).await?)
    } else {
        debug!("backend unreachable, request stays queued");
        None
    };

    match format {
        OutputFormat::Json => to_json(&json!({
            "id": id,
            "method": method,
            "url": url,
            "flush": report,
        })),
        OutputFormat::Pretty => {
            let mut output = format!(
                "{} Queued #{} {} {}",
                "✓".green(),
                id,
                method.as_str().bold(),
                url
            );
            match report {
                Some(report) => {
                    output.push('\n');
                    output.push_str(&format_flush_report(&report));
                }
                None if !no_flush => {
                    output.push_str(&format!(
                        "\n{}",
                        "Backend unreachable; it will be sent on the next flush".dimmed()
                    ));
                }
                None => {}
            }
            Ok(output)
        }
    }
}

/// Attempt every pending request once.
///
/// # Errors
///
/// Returns an error if the queue store fails.
pub async fn flush(
    ctx: &QueueContext,
    assume_online: bool,
    format: OutputFormat,
) -> Result<String, QueueError> {
    let online = assume_online || ctx.probe().await;
    let report = ctx.manager(online).flush_queue().await?;

    match format {
        OutputFormat::Json => to_json(&report),
        OutputFormat::Pretty => Ok(format_flush_report(&report)),
    }
}

/// Show queue depth, oldest entry and backend reachability.
///
/// # Errors
///
/// Returns an error if the queue store fails.
pub async fn status(ctx: &QueueContext, format: OutputFormat) -> Result<String, QueueError> {
    let manager = ctx.manager(false);
    let depth = manager.queue_depth().await?;
    let oldest = manager.oldest_pending().await?;
    let online = ctx.probe().await;

    format_status(depth, oldest, online, format)
}

/// List pending requests in replay order.
///
/// # Errors
///
/// Returns an error if the queue store fails.
pub async fn list(
    ctx: &QueueContext,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<String, QueueError> {
    let manager = ctx.manager(false);
    let mut requests = manager.pending().await?;
    let depth = requests.len() as u64;

    if let Some(limit) = limit {
        requests.truncate(limit);
    }

    format_requests(&requests, depth, format)
}

/// Drop every pending request.
///
/// # Errors
///
/// Returns an error without `--force`, or if the queue store fails.
pub async fn reset(
    ctx: &QueueContext,
    force: bool,
    format: OutputFormat,
) -> Result<String, QueueError> {
    if !force {
        return Err(QueueError::Config(
            "Use --force to drop every pending request".to_string(),
        ));
    }

    let manager = ctx.manager(false);
    let cleared = manager.queue_depth().await?;
    manager.reset_queue().await?;

    match format {
        OutputFormat::Json => to_json(&json!({ "cleared": cleared })),
        OutputFormat::Pretty => Ok(format!("Dropped {cleared} pending requests")),
    }
}
