//! Error types for fitqueue.

use thiserror::Error;

/// Errors produced by the queue, its storage and its transport.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The local database failed or returned undecodable data.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be loaded, saved or applied.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request descriptor was rejected before it was persisted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The network call could not be completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl QueueError {
    /// Whether this error means the local store is unusable.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}
