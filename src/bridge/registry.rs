use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::chain::{Chain, ChainPair};
use crate::clock::Clock;
use crate::config::ChainsConfig;
use crate::error::Error;
use crate::health::ChainHealthStatus;
use crate::telemetry;
use crate::Result;

/// Bridge state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeStatus {
    Online,
    Degraded,
    Offline,
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeStatus::Online => f.write_str("ONLINE"),
            BridgeStatus::Degraded => f.write_str("DEGRADED"),
            BridgeStatus::Offline => f.write_str("OFFLINE"),
        }
    }
}

/// Bridge contracts a connection talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRefs {
    pub source_contract: String,
    pub target_contract: String,
    /// Fresh on every initialization
    pub session_id: String,
}

/// Directional bridge record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConnection {
    pub source_chain: Chain,
    pub target_chain: Chain,
    pub status: BridgeStatus,
    pub confirmations_required: u32,
    pub latest_sync_block: Option<u64>,
    pub last_sync_timestamp: Option<u64>,
    pub contract_refs: ContractRefs,
    pub last_error: Option<String>,
    pub updated_at: u64,
}

impl BridgeConnection {
    pub fn pair(&self) -> ChainPair {
        ChainPair::new(self.source_chain, self.target_chain)
    }
}

/// Status a bridge should have given both endpoints' health
///
/// OFFLINE if either chain is unavailable, DEGRADED if either latency is
/// above `degraded_latency_ms`, ONLINE otherwise.
pub fn evaluate_status(
    source: Option<&ChainHealthStatus>,
    target: Option<&ChainHealthStatus>,
    degraded_latency_ms: u64,
) -> BridgeStatus {
    match (source, target) {
        (Some(s), Some(t)) if s.is_available && t.is_available => {
            if s.latency_ms > degraded_latency_ms || t.latency_ms > degraded_latency_ms {
                BridgeStatus::Degraded
            } else {
                BridgeStatus::Online
            }
        }
        _ => BridgeStatus::Offline,
    }
}

/// Owner of every bridge connection
///
/// Records are keyed by ordered pair, so `ETH->SOL` and `SOL->ETH` are
/// independent. Each record has its own lock.
pub struct BridgeRegistry {
    connections: DashMap<ChainPair, Arc<Mutex<BridgeConnection>>>,
    chains: ChainsConfig,
    degraded_latency_ms: u64,
    clock: Arc<dyn Clock>,
}

impl BridgeRegistry {
    pub fn new(chains: ChainsConfig, degraded_latency_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: DashMap::new(),
            chains,
            degraded_latency_ms,
            clock,
        }
    }

    /// Create the bridge, or reset an existing one to ONLINE
    pub fn initialize_bridge(&self, source: Chain, target: Chain) -> Result<BridgeConnection> {
        if source == target {
            return Err(Error::Validation(format!(
                "bridge source and target must differ, got {} twice",
                source
            )));
        }

        let pair = ChainPair::new(source, target);
        let now = self.clock.now_ms();
        let refs = ContractRefs {
            source_contract: self.chains.contract_for(source),
            target_contract: self.chains.contract_for(target),
            session_id: uuid::Uuid::new_v4().to_string(),
        };

        let record = self
            .connections
            .entry(pair)
            .or_insert_with(|| {
                Arc::new(Mutex::new(BridgeConnection {
                    source_chain: source,
                    target_chain: target,
                    status: BridgeStatus::Online,
                    confirmations_required: self.chains.confirmations_for(target),
                    latest_sync_block: None,
                    last_sync_timestamp: None,
                    contract_refs: refs.clone(),
                    last_error: None,
                    updated_at: now,
                }))
            })
            .clone();

        let mut connection = record.lock();
        if connection.status != BridgeStatus::Online {
            info!(bridge = %pair, from = %connection.status, "bridge reset to ONLINE");
        }
        connection.status = BridgeStatus::Online;
        connection.last_error = None;
        connection.contract_refs = refs;
        connection.updated_at = now;

        info!(bridge = %pair, confirmations = connection.confirmations_required, "bridge initialized");
        Ok(connection.clone())
    }

    pub fn get_bridge_status(&self, source: Chain, target: Chain) -> Result<BridgeConnection> {
        let pair = ChainPair::new(source, target);
        self.connections
            .get(&pair)
            .map(|record| record.lock().clone())
            .ok_or_else(|| Error::NotFound(format!("no bridge for {}", pair)))
    }

    /// Every bridge, ordered by pair
    pub fn get_bridge_statuses(&self) -> Vec<BridgeConnection> {
        let mut all: Vec<BridgeConnection> = self
            .connections
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        all.sort_by_key(|c| c.pair());
        all
    }

    /// Re-derive every bridge's status from a health snapshot
    ///
    /// Returns the number of bridges whose status changed.
    pub fn reevaluate(&self, health: &HashMap<Chain, ChainHealthStatus>) -> usize {
        let records: Vec<(ChainPair, Arc<Mutex<BridgeConnection>>)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let now = self.clock.now_ms();
        let mut changed = 0;

        for (pair, record) in records {
            let source = health.get(&pair.source);
            let target = health.get(&pair.target);
            let status = evaluate_status(source, target, self.degraded_latency_ms);

            let mut connection = record.lock();
            if let Some(target) = target.filter(|t| t.is_available) {
                connection.latest_sync_block = target.latest_block;
                connection.last_sync_timestamp = target.last_sync_timestamp;
            }
            if connection.status == status {
                continue;
            }

            match status {
                BridgeStatus::Online => {
                    info!(bridge = %pair, from = %connection.status, "bridge back ONLINE");
                }
                BridgeStatus::Degraded => {
                    warn!(bridge = %pair, from = %connection.status, "bridge DEGRADED");
                    connection.last_error = Some(format!(
                        "latency above {}ms",
                        self.degraded_latency_ms
                    ));
                }
                BridgeStatus::Offline => {
                    let down: Vec<&str> = [pair.source, pair.target]
                        .into_iter()
                        .filter(|c| !health.get(c).map(|h| h.is_available).unwrap_or(false))
                        .map(|c| c.as_str())
                        .collect();
                    warn!(bridge = %pair, from = %connection.status, unavailable = ?down, "bridge OFFLINE");
                    connection.last_error = Some(format!("unavailable: {}", down.join(", ")));
                }
            }
            metrics::increment_counter!(
                telemetry::BRIDGE_STATUS_CHANGES,
                "status" => status.to_string()
            );
            connection.status = status;
            connection.updated_at = now;
            changed += 1;
        }

        changed
    }

    /// Note a failure against a bridge without touching its status
    pub fn record_error(&self, source: Chain, target: Chain, message: impl Into<String>) {
        if let Some(record) = self.connections.get(&ChainPair::new(source, target)) {
            let mut connection = record.lock();
            connection.last_error = Some(message.into());
            connection.updated_at = self.clock.now_ms();
        }
    }

    pub fn confirmations_for(&self, target: Chain) -> u32 {
        self.chains.confirmations_for(target)
    }
}
