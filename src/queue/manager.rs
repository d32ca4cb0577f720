//! Queue manager: enqueue, flush and connectivity state.
//!
//! The manager is an explicitly constructed, cheaply clonable handle. Clones
//! share the same store, transport and flush guard, so every trigger (enqueue,
//! connectivity change, background sync, "retry now") funnels into one
//! [`QueueManager::flush`] entry point.
//!
//! Flushes never overlap. Within one manager the in-progress guard is a
//! capacity-1 lock taken with `try_lock`, released when the guard drops.
//! Across managers and processes sharing a database, the store's flush lease
//! plays the same role; it is renewed before every entry and released on
//! every exit path. Within a flush, entries are sent strictly one at a time in
//! enqueue order; entry N+1 is not sent until entry N is removed or its new
//! retry count is persisted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{DropReason, QueueEvent, SyncTrigger, EVENT_CHANNEL_CAPACITY};
use super::policy::RetryPolicy;
use super::report::{EntryResult, EntryStatus, FlushOutcome, FlushReport};
use super::request::{Headers, HttpMethod, NewRequest, QueuedRequest};
use super::store::RequestStore;
use super::transport::{OutgoingRequest, Transport};
use crate::error::QueueError;

/// Lease time beyond the per-send timeout, covering store writes.
const LEASE_GRACE: Duration = Duration::from_secs(60);

static NEXT_LEASE_OWNER: AtomicU64 = AtomicU64::new(0);

struct Inner<S, T> {
    store: S,
    /// Identifies this manager when holding the store's flush lease.
    lease_owner: String,
    transport: T,
    policy: RetryPolicy,
    online: AtomicBool,
    /// Bumped by `reset_queue`; a flush stops when it changes underneath it.
    generation: AtomicU64,
    flush_lock: Mutex<()>,
    events: broadcast::Sender<QueueEvent>,
}

/// Durable offline request queue.
pub struct QueueManager<S, T> {
    inner: Arc<Inner<S, T>>,
}

impl<S, T> Clone for QueueManager<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Why a single delivery attempt failed.
struct AttemptFailure {
    status: Option<u16>,
    message: String,
}

impl<S, T> QueueManager<S, T>
where
    S: RequestStore + 'static,
    T: Transport + 'static,
{
    /// Create a manager. It starts offline until told otherwise.
    #[must_use]
    pub fn new(store: S, transport: T, policy: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                lease_owner: format!(
                    "{}-{}",
                    std::process::id(),
                    NEXT_LEASE_OWNER.fetch_add(1, Ordering::Relaxed)
                ),
                transport,
                policy,
                online: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                flush_lock: Mutex::new(()),
                events,
            }),
        }
    }

    /// Set the initial connectivity state without triggering a flush.
    #[must_use]
    pub fn with_online(self, online: bool) -> Self {
        self.inner.online.store(online, Ordering::SeqCst);
        self
    }

    /// Subscribe to queue events (sent, retry scheduled, dropped...).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the manager currently believes the backend is reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity change.
    ///
    /// An offline to online transition starts a background flush, whose
    /// handle is returned.
    pub fn set_online(&self, online: bool) -> Option<JoinHandle<()>> {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                info!("connectivity restored");
                Some(self.trigger(SyncTrigger::ConnectivityRestored))
            }
            (true, false) => {
                info!("connectivity lost, replay paused");
                None
            }
            _ => None,
        }
    }

    /// Queue a mutating request for delivery.
    ///
    /// Returns the assigned id once the request is persisted. When online, a
    /// flush is started in the background; enqueue does not wait for it.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidRequest` for an empty url or invalid
    /// headers, and storage errors if the request could not be saved.
    pub async fn enqueue_request(
        &self,
        method: HttpMethod,
        url: &str,
        payload: Option<Value>,
        headers: Headers,
    ) -> Result<i64, QueueError> {
        let mut request = NewRequest::new(method, url);
        request.payload = payload;
        request.headers = headers;
        self.enqueue(request).await
    }

    /// Queue a prepared request. Its retry ceiling is taken from the policy.
    ///
    /// # Errors
    ///
    /// Same as [`QueueManager::enqueue_request`].
    pub async fn enqueue(&self, mut request: NewRequest) -> Result<i64, QueueError> {
        request.max_retries = self.inner.policy.max_retries;
        request.validate()?;

        let method = request.method;
        let url = request.url.clone();
        let id = self.inner.store.insert(request).await?;

        info!(id, %method, %url, "request queued");
        self.emit(QueueEvent::Enqueued { id, method, url });

        if self.is_online() {
            self.trigger(SyncTrigger::Enqueued);
        }

        Ok(id)
    }

    /// Start a flush in the background. Failures are logged, not returned.
    pub fn trigger(&self, trigger: SyncTrigger) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.flush(trigger).await {
                Ok(report) if !report.was_skipped() => {
                    debug!(%trigger, sent = report.sent, "background flush finished");
                }
                Ok(_) => {}
                Err(e) => error!(%trigger, error = %e, "background flush failed"),
            }
        })
    }

    /// Attempt every pending request once ("retry now").
    ///
    /// # Errors
    ///
    /// See [`QueueManager::flush`].
    pub async fn flush_queue(&self) -> Result<FlushReport, QueueError> {
        self.flush(SyncTrigger::Manual).await
    }

    /// Attempt every pending request once, in enqueue order.
    ///
    /// Returns immediately, touching neither queue nor network, when offline
    /// or when another flush is running, in this manager or in any other
    /// process using the same store. Send failures are recorded per entry and
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails: reading the queue, or
    /// persisting a removal or a retry count.
    pub async fn flush(&self, trigger: SyncTrigger) -> Result<FlushReport, QueueError> {
        if !self.is_online() {
            debug!(%trigger, "flush skipped: offline");
            return Ok(FlushReport::new(trigger, FlushOutcome::SkippedOffline));
        }

        let Ok(_guard) = self.inner.flush_lock.try_lock() else {
            debug!(%trigger, "flush skipped: already in progress");
            return Ok(FlushReport::new(trigger, FlushOutcome::SkippedInProgress));
        };

        if !self.renew_lease().await? {
            debug!(%trigger, "flush skipped: another process is flushing");
            return Ok(FlushReport::new(trigger, FlushOutcome::SkippedInProgress));
        }

        let result = self.flush_leased(trigger).await;

        if let Err(e) = self
            .inner
            .store
            .release_flush_lease(&self.inner.lease_owner)
            .await
        {
            warn!(error = %e, "failed to release flush lease");
        }

        result
    }

    async fn renew_lease(&self) -> Result<bool, QueueError> {
        let ttl = self.inner.policy.request_timeout + LEASE_GRACE;
        self.inner
            .store
            .acquire_flush_lease(&self.inner.lease_owner, ttl)
            .await
    }

    async fn flush_leased(&self, trigger: SyncTrigger) -> Result<FlushReport, QueueError> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let pending = self.inner.store.list_ordered().await?;
        let mut report = FlushReport::new(trigger, FlushOutcome::Completed);

        if pending.is_empty() {
            return Ok(report);
        }
        debug!(%trigger, pending = pending.len(), "flushing queue");

        for request in pending {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                info!("queue reset during flush, stopping");
                report.outcome = FlushOutcome::Interrupted;
                break;
            }
            if !self.renew_lease().await? {
                warn!("flush lease taken over, stopping");
                report.outcome = FlushOutcome::Interrupted;
                break;
            }
            let result = self.deliver(request).await?;
            report.add(result);
        }

        info!(
            %trigger,
            sent = report.sent,
            retrying = report.retrying,
            dropped = report.dropped,
            "flush finished"
        );
        Ok(report)
    }

    async fn deliver(&self, mut request: QueuedRequest) -> Result<EntryResult, QueueError> {
        let outgoing = OutgoingRequest::from_queued(&request);
        let timeout = self.inner.policy.request_timeout;

        debug!(
            id = request.id,
            method = %request.method,
            url = %request.url,
            attempt = request.retry_count + 1,
            "sending queued request"
        );

        let attempt = tokio::time::timeout(timeout, self.inner.transport.send(&outgoing)).await;
        let failure = match attempt {
            Ok(Ok(status)) if RetryPolicy::is_success(status) => {
                self.inner.store.remove(request.id).await?;
                debug!(id = request.id, status, "queued request delivered");
                self.emit(QueueEvent::Sent {
                    id: request.id,
                    status,
                });
                return Ok(EntryResult {
                    id: request.id,
                    method: request.method,
                    url: request.url,
                    status: EntryStatus::Sent { status },
                    error: None,
                });
            }
            Ok(Ok(status)) => AttemptFailure {
                status: Some(status),
                message: format!("HTTP {status}"),
            },
            Ok(Err(e)) => AttemptFailure {
                status: None,
                message: e.to_string(),
            },
            Err(_) => AttemptFailure {
                status: None,
                message: format!("timed out after {}ms", timeout.as_millis()),
            },
        };

        let seen_retry_count = request.retry_count;
        request.record_failure(failure.message.clone());

        let rejected = failure
            .status
            .filter(|&status| self.inner.policy.drops_immediately(status));

        if rejected.is_some() || request.is_exhausted() {
            self.inner.store.remove(request.id).await?;

            let reason = rejected.map_or(DropReason::RetriesExhausted, |status| {
                DropReason::Rejected { status }
            });
            warn!(
                id = request.id,
                method = %request.method,
                url = %request.url,
                attempts = request.retry_count,
                %reason,
                error = %failure.message,
                "queued request dropped"
            );
            self.emit(QueueEvent::Dropped {
                id: request.id,
                method: request.method,
                url: request.url.clone(),
                attempts: request.retry_count,
                reason,
                error: failure.message.clone(),
            });

            return Ok(EntryResult {
                id: request.id,
                method: request.method,
                url: request.url,
                status: EntryStatus::Dropped { reason },
                error: Some(failure.message),
            });
        }

        if self.inner.store.update(&request, seen_retry_count).await? {
            debug!(
                id = request.id,
                retry_count = request.retry_count,
                max_retries = request.max_retries,
                error = %failure.message,
                "queued request will be retried"
            );
            self.emit(QueueEvent::RetryScheduled {
                id: request.id,
                retry_count: request.retry_count,
                max_retries: request.max_retries,
                error: failure.message.clone(),
            });
        } else {
            warn!(
                id = request.id,
                "queued request changed during delivery, failure not recorded"
            );
        }

        Ok(EntryResult {
            id: request.id,
            method: request.method,
            url: request.url,
            status: EntryStatus::Retrying {
                retry_count: request.retry_count,
                max_retries: request.max_retries,
            },
            error: Some(failure.message),
        })
    }

    /// Number of pending requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        self.inner.store.count().await
    }

    /// Snapshot of pending requests in replay order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn pending(&self) -> Result<Vec<QueuedRequest>, QueueError> {
        self.inner.store.list_ordered().await
    }

    /// Enqueue time of the oldest pending request.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn oldest_pending(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        self.inner.store.oldest().await
    }

    /// Drop every pending request (used on logout).
    ///
    /// A flush that is running stops before its next entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub async fn reset_queue(&self) -> Result<(), QueueError> {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.store.clear().await?;
        info!("queue reset");
        Ok(())
    }

    /// Stop accepting flush triggers and wait for a running flush to finish.
    pub async fn shutdown(&self) {
        self.inner.online.store(false, Ordering::SeqCst);
        let _guard = self.inner.flush_lock.lock().await;
        debug!("queue manager shut down");
    }

    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
