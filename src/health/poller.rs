use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::bridge::{AssetTransferCoordinator, BridgeRegistry};
use crate::health::ChainHealthMonitor;

/// Background task polling chain health, re-evaluating bridges and
/// pruning settled transfers
///
/// Dropping the handle aborts the task.
pub struct HealthPoller {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HealthPoller {
    /// Start polling on the current runtime
    ///
    /// The first poll runs immediately. Ticks missed while a poll is still
    /// running are skipped.
    pub fn spawn(
        monitor: Arc<ChainHealthMonitor>,
        bridges: Arc<BridgeRegistry>,
        transfers: Arc<AssetTransferCoordinator>,
    ) -> Self {
        let (tx, mut rx) = oneshot::channel();
        let period = monitor.poll_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = period.as_millis() as u64, "health poller started");

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = interval.tick() => {
                        let health = monitor.check_all_chains_health().await;
                        let changed = bridges.reevaluate(&health);
                        let pruned = transfers.prune_settled_transfers();
                        debug!(chains = health.len(), bridges_changed = changed, pruned, "health poll complete");
                    }
                }
            }

            info!("health poller stopped");
        });

        Self {
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the task to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HealthPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
