use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::clock::Clock;
use crate::config::HealthConfig;
use crate::rpc::{ChainClient, ChainClientSet};
use crate::telemetry;

/// Health snapshot of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHealthStatus {
    pub chain: Chain,
    pub is_available: bool,
    pub latency_ms: u64,
    /// Last time the chain answered a probe
    pub last_sync_timestamp: Option<u64>,
    pub latest_block: Option<u64>,
    /// Time of the probe that produced this snapshot, 0 if never probed
    pub checked_at: u64,
    pub error: Option<String>,
}

impl ChainHealthStatus {
    fn unknown(chain: Chain) -> Self {
        Self {
            chain,
            is_available: false,
            latency_ms: 0,
            last_sync_timestamp: None,
            latest_block: None,
            checked_at: 0,
            error: None,
        }
    }
}

/// Polls every configured chain and caches the result
///
/// Chains start out unavailable until their first probe. Probes never fail:
/// a chain that errors or misses the probe timeout is recorded as
/// unavailable.
pub struct ChainHealthMonitor {
    clients: ChainClientSet,
    clock: Arc<dyn Clock>,
    config: HealthConfig,
    snapshot: RwLock<HashMap<Chain, ChainHealthStatus>>,
}

impl ChainHealthMonitor {
    pub fn new(clients: ChainClientSet, clock: Arc<dyn Clock>, config: HealthConfig) -> Self {
        let snapshot = clients
            .chains()
            .into_iter()
            .map(|chain| (chain, ChainHealthStatus::unknown(chain)))
            .collect();

        Self {
            clients,
            clock,
            config,
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub fn degraded_latency_ms(&self) -> u64 {
        self.config.degraded_latency_ms
    }

    /// Probe every chain concurrently and replace the cached snapshot
    pub async fn check_all_chains_health(&self) -> HashMap<Chain, ChainHealthStatus> {
        let probes = self.clients.chains().into_iter().filter_map(|chain| {
            let client = self.clients.get(chain).ok()?;
            Some(async move { self.probe(chain, client).await })
        });
        let results = join_all(probes).await;

        let mut snapshot = self.snapshot.write();
        for mut status in results {
            let previous = snapshot.get(&status.chain);
            if !status.is_available {
                status.last_sync_timestamp = previous.and_then(|p| p.last_sync_timestamp);
            }
            match previous {
                Some(prev) if prev.is_available != status.is_available => {
                    if status.is_available {
                        info!(chain = %status.chain, latency_ms = status.latency_ms, "chain available");
                    } else {
                        warn!(chain = %status.chain, error = ?status.error, "chain unavailable");
                    }
                }
                _ => {}
            }
            snapshot.insert(status.chain, status);
        }
        snapshot.clone()
    }

    async fn probe(&self, chain: Chain, client: Arc<dyn ChainClient>) -> ChainHealthStatus {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.probe_timeout, client.get_health()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let now = self.clock.now_ms();

        let status = match outcome {
            Ok(Ok(report)) => ChainHealthStatus {
                chain,
                is_available: true,
                latency_ms: report.latency_ms.unwrap_or(elapsed_ms),
                last_sync_timestamp: Some(now),
                latest_block: Some(report.latest_block),
                checked_at: now,
                error: None,
            },
            Ok(Err(e)) => ChainHealthStatus {
                chain,
                is_available: false,
                latency_ms: elapsed_ms,
                last_sync_timestamp: None,
                latest_block: None,
                checked_at: now,
                error: Some(e.to_string()),
            },
            Err(_) => ChainHealthStatus {
                chain,
                is_available: false,
                latency_ms: elapsed_ms,
                last_sync_timestamp: None,
                latest_block: None,
                checked_at: now,
                error: Some(format!(
                    "health probe exceeded {}ms",
                    self.config.probe_timeout.as_millis()
                )),
            },
        };

        debug!(chain = %chain, available = status.is_available, latency_ms = status.latency_ms, "health probe");
        metrics::increment_counter!(
            telemetry::HEALTH_PROBES,
            "chain" => chain.as_str(),
            "available" => if status.is_available { "true" } else { "false" }
        );
        status
    }

    /// Cached snapshot
    pub fn get_chain_health_status(&self) -> HashMap<Chain, ChainHealthStatus> {
        self.snapshot.read().clone()
    }

    /// Cached snapshot, refreshed first if any entry is older than the poll interval
    pub async fn current(&self) -> HashMap<Chain, ChainHealthStatus> {
        let stale = {
            let snapshot = self.snapshot.read();
            snapshot.keys().any(|chain| self.is_stale_in(&snapshot, *chain))
        };
        if stale {
            self.check_all_chains_health().await
        } else {
            self.get_chain_health_status()
        }
    }

    pub fn status_of(&self, chain: Chain) -> Option<ChainHealthStatus> {
        self.snapshot.read().get(&chain).cloned()
    }

    /// Unknown chains are unavailable
    pub fn is_available(&self, chain: Chain) -> bool {
        self.snapshot
            .read()
            .get(&chain)
            .map(|s| s.is_available)
            .unwrap_or(false)
    }

    pub fn is_stale(&self, chain: Chain) -> bool {
        let snapshot = self.snapshot.read();
        self.is_stale_in(&snapshot, chain)
    }

    fn is_stale_in(&self, snapshot: &HashMap<Chain, ChainHealthStatus>, chain: Chain) -> bool {
        match snapshot.get(&chain) {
            Some(status) if status.checked_at > 0 => {
                let age = self.clock.now_ms().saturating_sub(status.checked_at);
                age > self.config.poll_interval.as_millis() as u64
            }
            _ => true,
        }
    }
}
