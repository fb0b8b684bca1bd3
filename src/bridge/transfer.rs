use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::bridge::{BridgeRegistry, BridgeStatus};
use crate::chain::Chain;
use crate::clock::Clock;
use crate::config::{BridgeConfig, ChainsConfig};
use crate::error::Error;
use crate::recovery::ErrorClassifier;
use crate::rpc::{with_retry, ChainClientSet, RetryPolicy};
use crate::telemetry;
use crate::Result;

/// Asset transfer between two chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransferRequest {
    pub source_chain: Chain,
    pub target_chain: Chain,
    /// Decimal amount in the asset's native units
    pub amount: String,
    pub asset_type: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub timestamp: Option<u64>,
}

/// Arbitrary message relayed between two chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRelayRequest {
    pub source_chain: Chain,
    pub target_chain: Chain,
    pub payload: serde_json::Value,
    pub sender_address: String,
    pub recipient_address: String,
    /// Attestation the target chain verifies the message against
    pub proof: Option<String>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    /// Submitted over a degraded bridge
    PendingSlow,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Asset,
    Message,
}

/// Answer to a submitted transfer or relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_id: String,
    pub status: TransferStatus,
    pub estimated_completion_time: u64,
    pub fee: String,
}

/// Transfer as tracked by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTransfer {
    pub transaction_id: String,
    pub kind: TransferKind,
    pub source_chain: Chain,
    pub target_chain: Chain,
    pub sender_address: String,
    pub recipient_address: String,
    pub status: TransferStatus,
    pub fee: String,
    pub submitted_at: u64,
    pub estimated_completion_time: u64,
    /// Highest confirmation count observed so far
    pub confirmations: u32,
    pub settled_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionVerificationResult {
    pub transaction_id: String,
    pub source_chain: Chain,
    pub target_chain: Chain,
    pub verified: bool,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub completion_percentage: u8,
    /// Milliseconds until settlement, `None` once verified
    pub estimated_time_remaining: Option<u64>,
}

/// `min(100, round(100 * confirmations / required))`
pub fn completion_percentage(confirmations: u32, required: u32) -> u8 {
    if required == 0 {
        return 100;
    }
    let confirmations = confirmations as u64;
    let required = required as u64;
    let rounded = (200 * confirmations + required) / (2 * required);
    rounded.min(100) as u8
}

/// Submits transfers and message relays over registered bridges and tracks them
pub struct AssetTransferCoordinator {
    bridges: Arc<BridgeRegistry>,
    clients: ChainClientSet,
    classifier: Arc<ErrorClassifier>,
    retry: Arc<dyn RetryPolicy>,
    chains: ChainsConfig,
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
    transfers: DashMap<String, Arc<Mutex<TrackedTransfer>>>,
}

impl AssetTransferCoordinator {
    pub fn new(
        bridges: Arc<BridgeRegistry>,
        clients: ChainClientSet,
        classifier: Arc<ErrorClassifier>,
        retry: Arc<dyn RetryPolicy>,
        chains: ChainsConfig,
        config: BridgeConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bridges,
            clients,
            classifier,
            retry,
            chains,
            config,
            clock,
            transfers: DashMap::new(),
        }
    }

    pub fn transfer_asset(&self, request: &AssetTransferRequest) -> Result<TransferReceipt> {
        let amount: f64 = request
            .amount
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid amount: {:?}", request.amount)))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Validation("amount must be positive".into()));
        }
        if request.asset_type.trim().is_empty() {
            return Err(Error::Validation("asset type is required".into()));
        }

        self.submit(
            TransferKind::Asset,
            request.source_chain,
            request.target_chain,
            &request.sender_address,
            &request.recipient_address,
        )
    }

    /// Same contract as [`transfer_asset`](Self::transfer_asset), but a proof is mandatory
    pub fn relay_message(&self, request: &MessageRelayRequest) -> Result<TransferReceipt> {
        match request.proof.as_deref() {
            Some(proof) if !proof.trim().is_empty() => {}
            _ => return Err(Error::Validation("message relay requires a proof".into())),
        }

        self.submit(
            TransferKind::Message,
            request.source_chain,
            request.target_chain,
            &request.sender_address,
            &request.recipient_address,
        )
    }

    fn submit(
        &self,
        kind: TransferKind,
        source: Chain,
        target: Chain,
        sender: &str,
        recipient: &str,
    ) -> Result<TransferReceipt> {
        if sender.trim().is_empty() || recipient.trim().is_empty() {
            return Err(Error::Validation("sender and recipient addresses are required".into()));
        }

        let bridge = self.bridges.get_bridge_status(source, target)?;
        let (status, multiplier) = match bridge.status {
            BridgeStatus::Offline => {
                return Err(Error::BridgeOffline {
                    source_chain: source,
                    target_chain: target,
                })
            }
            BridgeStatus::Degraded => (TransferStatus::PendingSlow, self.config.degraded_eta_multiplier as u64),
            BridgeStatus::Online => (TransferStatus::Pending, 1),
        };

        let now = self.clock.now_ms();
        let interval_ms = self.chains.interval_for(target).as_millis() as u64;
        let eta = now + bridge.confirmations_required as u64 * interval_ms * multiplier;
        let fee = self.chains.fee_for(source);
        let transaction_id = format!("tx-{}", uuid::Uuid::new_v4().simple());

        self.transfers.insert(
            transaction_id.clone(),
            Arc::new(Mutex::new(TrackedTransfer {
                transaction_id: transaction_id.clone(),
                kind,
                source_chain: source,
                target_chain: target,
                sender_address: sender.to_string(),
                recipient_address: recipient.to_string(),
                status,
                fee: fee.clone(),
                submitted_at: now,
                estimated_completion_time: eta,
                confirmations: 0,
                settled_at: None,
            })),
        );

        info!(
            transaction_id = %transaction_id,
            source = %source,
            target = %target,
            kind = ?kind,
            status = ?status,
            "transfer submitted"
        );
        metrics::increment_counter!(
            telemetry::TRANSFERS_SUBMITTED,
            "kind" => match kind { TransferKind::Asset => "asset", TransferKind::Message => "message" },
            "slow" => if status == TransferStatus::PendingSlow { "true" } else { "false" }
        );

        Ok(TransferReceipt {
            transaction_id,
            status,
            estimated_completion_time: eta,
            fee,
        })
    }

    /// Query the target chain for confirmations
    ///
    /// For tracked transfers the reported count never decreases between polls.
    pub async fn verify_transaction(
        &self,
        transaction_id: &str,
        source: Chain,
        target: Chain,
    ) -> Result<TransactionVerificationResult> {
        if transaction_id.trim().is_empty() {
            return Err(Error::Validation("transaction id is required".into()));
        }

        let tracked = self.transfers.get(transaction_id).map(|entry| entry.value().clone());
        if let Some(record) = &tracked {
            let transfer = record.lock();
            if transfer.source_chain != source || transfer.target_chain != target {
                return Err(Error::Validation(format!(
                    "transaction {} was submitted on {}->{}",
                    transaction_id, transfer.source_chain, transfer.target_chain
                )));
            }
        }

        let required = self
            .bridges
            .get_bridge_status(source, target)
            .map(|b| b.confirmations_required)
            .unwrap_or_else(|_| self.chains.confirmations_for(target));

        let client = self.clients.get(target)?;
        let observed = with_retry(
            target,
            self.config.call_timeout,
            self.retry.as_ref(),
            &self.classifier,
            || client.get_confirmations(transaction_id),
        )
        .await?;

        let confirmations = match &tracked {
            Some(record) => {
                let mut transfer = record.lock();
                transfer.confirmations = transfer.confirmations.max(observed);
                if transfer.confirmations >= required && transfer.status != TransferStatus::Settled {
                    transfer.status = TransferStatus::Settled;
                    transfer.settled_at = Some(self.clock.now_ms());
                    info!(transaction_id = %transaction_id, confirmations = transfer.confirmations, "transfer settled");
                }
                transfer.confirmations
            }
            None => observed,
        };

        let verified = confirmations >= required;
        let interval_ms = self.chains.interval_for(target).as_millis() as u64;
        let result = TransactionVerificationResult {
            transaction_id: transaction_id.to_string(),
            source_chain: source,
            target_chain: target,
            verified,
            confirmations,
            required_confirmations: required,
            completion_percentage: completion_percentage(confirmations, required),
            estimated_time_remaining: (!verified)
                .then(|| (required - confirmations) as u64 * interval_ms),
        };

        debug!(
            transaction_id = %transaction_id,
            confirmations,
            required,
            "transaction verification"
        );
        metrics::increment_counter!(
            telemetry::TRANSFER_VERIFICATIONS,
            "verified" => if verified { "true" } else { "false" }
        );
        Ok(result)
    }

    /// Drop transfers settled longer ago than the retention window
    pub fn prune_settled_transfers(&self) -> usize {
        let now = self.clock.now_ms();
        let retention = u64::try_from(self.config.settled_retention.as_millis()).unwrap_or(u64::MAX);
        let before = self.transfers.len();
        self.transfers.retain(|_, record| {
            let transfer = record.lock();
            match transfer.settled_at {
                Some(at) => at.saturating_add(retention) > now,
                None => true,
            }
        });

        let pruned = before.saturating_sub(self.transfers.len());
        if pruned > 0 {
            debug!(pruned, "settled transfers pruned");
        }
        pruned
    }

    pub fn get_transfer(&self, transaction_id: &str) -> Result<TrackedTransfer> {
        self.transfers
            .get(transaction_id)
            .map(|entry| entry.value().lock().clone())
            .ok_or_else(|| Error::NotFound(format!("transfer {}", transaction_id)))
    }
}
