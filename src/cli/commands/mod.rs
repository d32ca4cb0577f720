//! Command implementations for fitqueue.

mod completions;
mod queue;
mod watch;

use std::path::Path;

pub use completions::completions;
pub use queue::{enqueue, flush, list, reset, status};
pub use watch::watch;

use crate::cli::args::{Commands, OutputFormat};
use crate::config::Config;
use crate::error::QueueError;
use crate::queue::{HttpTransport, QueueManager, RetryPolicy, SqliteStore};

/// Everything a command needs to talk to the queue.
pub struct QueueContext {
    store: SqliteStore,
    transport: HttpTransport,
    policy: RetryPolicy,
    config: Config,
}

impl QueueContext {
    /// Open the queue database and build the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the HTTP client
    /// cannot be built.
    pub fn open(config: Config, db_path: &Path) -> Result<Self, QueueError> {
        let store = SqliteStore::open_at(db_path)?;
        let transport = HttpTransport::from_config(&config.api)?;

        Ok(Self {
            store,
            transport,
            policy: config.retry_policy(),
            config,
        })
    }

    /// A manager over the shared store, starting in the given connectivity state.
    #[must_use]
    pub fn manager(&self, online: bool) -> QueueManager<SqliteStore, HttpTransport> {
        QueueManager::new(self.store.clone(), self.transport.clone(), self.policy)
            .with_online(online)
    }

    /// Whether the backend answers right now.
    pub async fn probe(&self) -> bool {
        self.transport.probe().await
    }

    #[must_use]
    pub const fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

/// Dispatch a queue command.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn execute(
    ctx: &QueueContext,
    command: Commands,
    format: OutputFormat,
) -> Result<String, QueueError> {
    match command {
        Commands::Enqueue {
            method,
            url,
            data,
            headers,
            no_flush,
        } => enqueue(ctx, &method, &url, data.as_deref(), headers, no_flush, format).await,
        Commands::Flush { assume_online } => flush(ctx, assume_online, format).await,
        Commands::Status => status(ctx, format).await,
        Commands::List { limit } => list(ctx, limit, format).await,
        Commands::Reset { force } => reset(ctx, force, format).await,
        Commands::Watch => watch(ctx).await,
        Commands::Completions { shell } => Ok(completions(shell)),
    }
}
