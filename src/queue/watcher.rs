//! Connectivity watcher and periodic background sync.
//!
//! Polls the backend with a [`ConnectivityProbe`] and feeds the result into
//! [`QueueManager::set_online`]; an offline to online transition flushes the
//! queue. A second timer fires [`SyncTrigger::BackgroundSync`] flushes.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::events::SyncTrigger;
use super::manager::QueueManager;
use super::store::RequestStore;
use super::transport::{HttpTransport, Transport};
use crate::config::SyncConfig;

/// Answers "is the backend reachable right now?".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

#[async_trait]
impl ConnectivityProbe for HttpTransport {
    async fn is_reachable(&self) -> bool {
        self.probe().await
    }
}

/// Drives a [`QueueManager`] from connectivity probes and a sync timer.
pub struct SyncWatcher<S, T, P> {
    manager: QueueManager<S, T>,
    probe: P,
    probe_interval: Duration,
    background_sync_interval: Duration,
}

impl<S, T, P> SyncWatcher<S, T, P>
where
    S: RequestStore + 'static,
    T: Transport + 'static,
    P: ConnectivityProbe,
{
    /// Create a watcher using the intervals from the `sync` config section.
    #[must_use]
    pub fn new(manager: QueueManager<S, T>, probe: P, config: &SyncConfig) -> Self {
        Self::with_intervals(
            manager,
            probe,
            config.probe_interval(),
            config.background_sync_interval(),
        )
    }

    #[must_use]
    pub const fn with_intervals(
        manager: QueueManager<S, T>,
        probe: P,
        probe_interval: Duration,
        background_sync_interval: Duration,
    ) -> Self {
        Self {
            manager,
            probe,
            probe_interval,
            background_sync_interval,
        }
    }

    /// Run until `shutdown` resolves, then wait for any running flush.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut probe_tick = interval(self.probe_interval);
        probe_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sync_tick = interval(self.background_sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the probe covers startup.
        sync_tick.reset();

        tokio::pin!(shutdown);

        info!(
            probe_secs = self.probe_interval.as_secs(),
            sync_secs = self.background_sync_interval.as_secs(),
            "watching connectivity"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = probe_tick.tick() => {
                    let reachable = self.probe.is_reachable().await;
                    debug!(reachable, "connectivity probe");
                    self.manager.set_online(reachable);
                }
                _ = sync_tick.tick() => {
                    if self.manager.is_online() {
                        self.manager.trigger(SyncTrigger::BackgroundSync);
                    }
                }
            }
        }

        info!("watcher stopping");
        self.manager.shutdown().await;
    }
}
