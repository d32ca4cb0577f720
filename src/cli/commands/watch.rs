//! Long-running replay loop.

use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{info, warn};

use super::QueueContext;
use crate::error::QueueError;
use crate::queue::{QueueEvent, SyncWatcher};

/// Probe connectivity and replay the queue until Ctrl-C.
///
/// Queue events are logged as they happen; the returned string is the final
/// summary line.
///
/// # Errors
///
/// Returns an error if the queue store cannot be read at startup.
pub async fn watch(ctx: &QueueContext) -> Result<String, QueueError> {
    let manager = ctx.manager(false);
    let depth = manager.queue_depth().await?;
    info!(depth, base_url = ctx.transport().base_url(), "starting watcher");

    let reporter = tokio::spawn(report_events(manager.subscribe()));

    let watcher = SyncWatcher::new(
        manager.clone(),
        ctx.transport().clone(),
        &ctx.config().sync,
    );
    watcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    reporter.abort();

    let remaining = manager.queue_depth().await?;
    Ok(format!("Stopped watching; {remaining} requests still pending"))
}

/// Log queue events until the channel closes. Returns how many were logged.
///
/// A slow reporter that falls behind skips the overwritten events and keeps
/// going.
async fn report_events(mut events: Receiver<QueueEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                match &event {
                    QueueEvent::Dropped { .. } => {
                        warn!(id = event.id(), event = ?event, "queue event");
                    }
                    _ => info!(id = event.id(), event = ?event, "queue event"),
                }
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event reporter fell behind, events skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
