//! Diagnostic events emitted by the queue manager.

use serde::Serialize;

use super::request::HttpMethod;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What started a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// The client went from offline to online.
    ConnectivityRestored,
    /// Periodic background sync.
    BackgroundSync,
    /// A request was enqueued while online.
    Enqueued,
    /// Explicit caller request ("retry now").
    Manual,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConnectivityRestored => "connectivity_restored",
            Self::BackgroundSync => "background_sync",
            Self::Enqueued => "enqueued",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Why an entry left the queue without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// `retry_count` reached `max_retries`.
    RetriesExhausted,
    /// The server rejected the request with a non-retryable client error.
    Rejected { status: u16 },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RetriesExhausted => f.write_str("retries exhausted"),
            Self::Rejected { status } => write!(f, "rejected with HTTP {status}"),
        }
    }
}

/// A change in the state of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued {
        id: i64,
        method: HttpMethod,
        url: String,
    },
    Sent {
        id: i64,
        status: u16,
    },
    RetryScheduled {
        id: i64,
        retry_count: u32,
        max_retries: u32,
        error: String,
    },
    /// The entry was removed undelivered; the user's action is lost.
    Dropped {
        id: i64,
        method: HttpMethod,
        url: String,
        attempts: u32,
        reason: DropReason,
        error: String,
    },
}

impl QueueEvent {
    /// Id of the entry this event is about.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Enqueued { id, .. }
            | Self::Sent { id, .. }
            | Self::RetryScheduled { id, .. }
            | Self::Dropped { id, .. } => *id,
        }
    }
}
