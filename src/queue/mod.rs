//! Durable offline request queue.
//!
//! Mutating requests (POST, PUT, PATCH, DELETE) made while the backend is
//! unreachable are persisted locally and replayed in enqueue order once
//! connectivity returns. Each entry gets a bounded number of attempts and is
//! always sent with `Idempotency-Key: <id>` so the server can deduplicate a
//! replay of a request it already processed.
//!
//! The pieces:
//!
//! - [`RequestStore`] / [`SqliteStore`]: ordered durable storage
//! - [`Transport`] / [`HttpTransport`]: sends one request, returns the status
//! - [`QueueManager`]: enqueue, flush, reset, connectivity state
//! - [`SyncWatcher`]: probes connectivity and runs periodic background syncs

mod events;
mod manager;
mod policy;
mod report;
mod request;
mod store;
mod transport;
mod watcher;

pub use events::{DropReason, QueueEvent, SyncTrigger};
pub use manager::QueueManager;
pub use policy::RetryPolicy;
pub use report::{format_flush_report, EntryResult, EntryStatus, FlushOutcome, FlushReport};
pub use request::{Headers, HttpMethod, NewRequest, QueuedRequest, DEFAULT_MAX_RETRIES};
pub use store::{RequestStore, SqliteStore};
pub use transport::{HttpTransport, OutgoingRequest, Transport, IDEMPOTENCY_HEADER};
pub use watcher::{ConnectivityProbe, SyncWatcher};
