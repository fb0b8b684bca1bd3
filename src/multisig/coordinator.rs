use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chain::Chain;
use crate::clock::Clock;
use crate::config::MultisigConfig;
use crate::error::Error;
use crate::multisig::{
    ApprovalConfig,
    ApprovalStatus,
    ApprovalType,
    MultiSignatureGateway,
    SignatureVerificationMethod,
    TransactionData,
    CROSS_CHAIN_REQUEST_ID,
};
use crate::proof::{AggregatedProof, ProofAggregationService, ProofClaim};
use crate::recovery::ErrorClassifier;
use crate::rpc::{run_windowed, with_retry, ChainClientSet, RetryPolicy};
use crate::verification::validate_entity_id;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainOptions {
    /// Threshold per chain, overriding the source/secondary defaults
    pub required_signers_per_chain: BTreeMap<Chain, u32>,
    pub expiration: Option<Duration>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerChainRequest {
    pub chain: Chain,
    pub approval_request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFailure {
    pub chain: Chain,
    pub reason: String,
}

/// Logical approval spread over several chains
///
/// Holds only references to the per-chain requests the gateway owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainApprovalRequest {
    pub cross_chain_request_id: String,
    pub vault_id: String,
    pub source_chain: Chain,
    pub required_chains: Vec<Chain>,
    pub per_chain_requests: Vec<PerChainRequest>,
    pub failed_chains: Vec<ChainFailure>,
    pub required_confirmations: u32,
    pub created_at: u64,
    pub proof_id: Option<String>,
}

impl CrossChainApprovalRequest {
    pub fn request_for(&self, chain: Chain) -> Option<&str> {
        self.per_chain_requests
            .iter()
            .find(|r| r.chain == chain)
            .map(|r| r.approval_request_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainSignatureResult {
    pub verified: bool,
    pub verified_chains: Vec<Chain>,
    pub failed_chains: Vec<ChainFailure>,
    /// Chains whose request is APPROVED
    pub completed_chains: Vec<Chain>,
    pub all_chains_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossChainStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

/// Overall status of a set of per-chain statuses
///
/// Approved only when every chain is; otherwise the first of rejected,
/// expired, cancelled present wins, and pending is the fallback.
pub fn fold_status(statuses: &[ApprovalStatus]) -> CrossChainStatus {
    let any = |s: ApprovalStatus| statuses.iter().any(|x| *x == s);
    if !statuses.is_empty() && statuses.iter().all(|s| *s == ApprovalStatus::Approved) {
        CrossChainStatus::Approved
    } else if any(ApprovalStatus::Rejected) {
        CrossChainStatus::Rejected
    } else if any(ApprovalStatus::Expired) {
        CrossChainStatus::Expired
    } else if any(ApprovalStatus::Cancelled) {
        CrossChainStatus::Cancelled
    } else {
        CrossChainStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainApprovalProgress {
    pub chain: Chain,
    pub approval_request_id: String,
    pub status: ApprovalStatus,
    pub received_weight: u64,
    pub threshold_weight: u32,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainRequestStatus {
    pub cross_chain_request_id: String,
    pub vault_id: String,
    pub status: CrossChainStatus,
    /// Mean of the per-chain progress values
    pub progress: u8,
    pub chains: Vec<ChainApprovalProgress>,
    pub approved_chains: Vec<Chain>,
    pub pending_chains: Vec<Chain>,
    /// Required chains whose per-chain request was never created
    pub missing_chains: Vec<Chain>,
}

impl CrossChainRequestStatus {
    /// Approved on every required chain, and on at least two of them
    pub fn is_fully_approved(&self) -> bool {
        self.status == CrossChainStatus::Approved
            && self.missing_chains.is_empty()
            && self.approved_chains.len() >= 2
    }
}

/// Fans one logical approval out into a gateway request per chain
pub struct CrossChainMultiSigCoordinator {
    gateway: Arc<MultiSignatureGateway>,
    proofs: Arc<ProofAggregationService>,
    clients: ChainClientSet,
    classifier: Arc<ErrorClassifier>,
    retry: Arc<dyn RetryPolicy>,
    config: MultisigConfig,
    clock: Arc<dyn Clock>,
    requests: DashMap<String, CrossChainApprovalRequest>,
}

impl CrossChainMultiSigCoordinator {
    pub fn new(
        gateway: Arc<MultiSignatureGateway>,
        proofs: Arc<ProofAggregationService>,
        clients: ChainClientSet,
        classifier: Arc<ErrorClassifier>,
        retry: Arc<dyn RetryPolicy>,
        config: MultisigConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            proofs,
            clients,
            classifier,
            retry,
            config,
            clock,
            requests: DashMap::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_cross_chain_approval_request(
        &self,
        vault_id: &str,
        creator_id: &str,
        source_chain: Chain,
        secondary_chains: &[Chain],
        approval_type: ApprovalType,
        transaction_data: serde_json::Value,
        required_confirmations: u32,
        options: CrossChainOptions,
    ) -> Result<CrossChainApprovalRequest> {
        validate_entity_id(vault_id)?;

        let mut chains = vec![source_chain];
        for chain in secondary_chains {
            if !chains.contains(chain) {
                chains.push(*chain);
            }
        }
        let supported: Vec<Chain> = chains
            .into_iter()
            .filter(|c| self.config.supported_chains.contains(c))
            .collect();
        if supported.len() < 2 {
            return Err(Error::InsufficientChains { supplied: supported.len() });
        }

        let now = self.clock.now_ms();
        let salt: [u8; 16] = rand::random();
        let cross_chain_request_id = hex::encode(Sha256::digest(
            format!("cross-chain:{}:{}:{}:{}", vault_id, approval_type, now, hex::encode(salt)).as_bytes(),
        ));

        let mut data = match transaction_data {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".into(), other);
                map
            }
        };
        data.insert(CROSS_CHAIN_REQUEST_ID.into(), cross_chain_request_id.clone().into());
        let data = serde_json::Value::Object(data);

        let outcomes = run_windowed(supported.iter().copied(), self.config.window, |chain| {
            let threshold = options
                .required_signers_per_chain
                .get(&chain)
                .copied()
                .unwrap_or(if chain == source_chain {
                    self.config.source_threshold
                } else {
                    self.config.secondary_threshold
                });

            let mut metadata = options.metadata.clone();
            metadata.insert(CROSS_CHAIN_REQUEST_ID.into(), cross_chain_request_id.clone().into());
            metadata.insert("isPartOfCrossChainApproval".into(), true.into());
            metadata.insert("requiredChains".into(), json!(supported));
            metadata.insert("sourceChain".into(), json!(source_chain));
            metadata.insert("requiredConfirmations".into(), required_confirmations.into());

            let config = ApprovalConfig {
                custom_threshold_weight: threshold,
                expiration: options.expiration,
                signer_weights: BTreeMap::new(),
                metadata,
            };
            let tx = TransactionData { chain, data: data.clone() };

            async move {
                let outcome = self
                    .gateway
                    .create_approval_request(vault_id, creator_id, approval_type, tx, config)
                    .await;
                (chain, outcome)
            }
        })
        .await;

        let mut per_chain_requests = Vec::new();
        let mut failed_chains = Vec::new();
        for (chain, outcome) in outcomes {
            match outcome {
                Ok(request) => per_chain_requests.push(PerChainRequest {
                    chain,
                    approval_request_id: request.id,
                }),
                Err(e) => {
                    warn!(chain = %chain, vault_id = %vault_id, error = %e, "per-chain approval request failed");
                    failed_chains.push(ChainFailure {
                        chain,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let request = CrossChainApprovalRequest {
            cross_chain_request_id: cross_chain_request_id.clone(),
            vault_id: vault_id.to_string(),
            source_chain,
            required_chains: supported,
            per_chain_requests,
            failed_chains,
            required_confirmations,
            created_at: now,
            proof_id: None,
        };

        info!(
            cross_chain_request_id = %cross_chain_request_id,
            vault_id = %vault_id,
            created = request.per_chain_requests.len(),
            failed = request.failed_chains.len(),
            "cross-chain approval request created"
        );
        self.requests.insert(cross_chain_request_id, request.clone());
        Ok(request)
    }

    pub fn get_cross_chain_request(&self, cross_chain_request_id: &str) -> Result<CrossChainApprovalRequest> {
        self.requests
            .get(cross_chain_request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("cross-chain request {}", cross_chain_request_id)))
    }

    /// Verify per-chain signatures and tally the valid ones
    ///
    /// Signatures for chains outside the request are ignored.
    pub async fn verify_cross_chain_signature(
        &self,
        cross_chain_request_id: &str,
        signer_address: &str,
        signatures: &BTreeMap<Chain, String>,
        method: SignatureVerificationMethod,
    ) -> Result<CrossChainSignatureResult> {
        if signer_address.trim().is_empty() {
            return Err(Error::Validation("signer address is required".into()));
        }
        let request = self.get_cross_chain_request(cross_chain_request_id)?;

        let entries: Vec<(Chain, String)> = signatures
            .iter()
            .filter(|(chain, _)| request.required_chains.contains(chain))
            .map(|(chain, sig)| (*chain, sig.clone()))
            .collect();

        let outcomes = run_windowed(entries, self.config.window, |(chain, signature)| {
            let approval_request_id = request.request_for(chain).map(str::to_string);
            async move {
                let Some(approval_request_id) = approval_request_id else {
                    return (chain, Err::<(), String>("no approval request on this chain".to_string()));
                };
                let outcome = self
                    .verify_on_chain(chain, &approval_request_id, signer_address, &signature, method)
                    .await
                    .map_err(|e| e.to_string());
                (chain, outcome)
            }
        })
        .await;

        let mut verified_chains = Vec::new();
        let mut failed_chains = Vec::new();
        for (chain, outcome) in outcomes {
            match outcome {
                Ok(()) => verified_chains.push(chain),
                Err(reason) => failed_chains.push(ChainFailure { chain, reason }),
            }
        }

        let completed_chains = self.approved_chains(&request);
        let all_chains_verified = request
            .required_chains
            .iter()
            .all(|c| completed_chains.contains(c));

        info!(
            cross_chain_request_id = %cross_chain_request_id,
            signer = %signer_address,
            verified = verified_chains.len(),
            failed = failed_chains.len(),
            all_chains_verified,
            "cross-chain signature processed"
        );

        Ok(CrossChainSignatureResult {
            verified: !verified_chains.is_empty(),
            verified_chains,
            failed_chains,
            completed_chains,
            all_chains_verified,
        })
    }

    async fn verify_on_chain(
        &self,
        chain: Chain,
        approval_request_id: &str,
        signer_address: &str,
        signature: &str,
        method: SignatureVerificationMethod,
    ) -> Result<()> {
        let approval = self.gateway.get_request(approval_request_id)?;
        let message = MultiSignatureGateway::signing_message(&approval)?;
        let client = self.clients.get(chain)?;

        let valid = with_retry(
            chain,
            self.config.call_timeout,
            self.retry.as_ref(),
            &self.classifier,
            || client.verify_signature(&message, signature, signer_address),
        )
        .await?;
        if !valid {
            return Err(Error::InvalidSignature {
                chain,
                signer: signer_address.to_string(),
            });
        }

        self.gateway.tally_verified_signature(
            approval_request_id,
            signer_address,
            signature,
            method,
            Some(json!({ "crossChainVerified": true, "timestamp": self.clock.now_ms() })),
        )?;
        Ok(())
    }

    fn approved_chains(&self, request: &CrossChainApprovalRequest) -> Vec<Chain> {
        request
            .per_chain_requests
            .iter()
            .filter(|r| {
                self.gateway
                    .get_request(&r.approval_request_id)
                    .map(|a| a.status == ApprovalStatus::Approved)
                    .unwrap_or(false)
            })
            .map(|r| r.chain)
            .collect()
    }

    pub fn get_cross_chain_request_status(&self, cross_chain_request_id: &str) -> Result<CrossChainRequestStatus> {
        let request = self.get_cross_chain_request(cross_chain_request_id)?;

        let mut chains = Vec::with_capacity(request.per_chain_requests.len());
        for per_chain in &request.per_chain_requests {
            let approval = self.gateway.get_request(&per_chain.approval_request_id)?;
            chains.push(ChainApprovalProgress {
                chain: per_chain.chain,
                approval_request_id: approval.id.clone(),
                status: approval.status,
                received_weight: approval.received_weight(),
                threshold_weight: approval.threshold_weight,
                progress: approval.progress(),
            });
        }

        let missing_chains: Vec<Chain> = request
            .required_chains
            .iter()
            .copied()
            .filter(|c| request.request_for(*c).is_none())
            .collect();

        // A chain without a request can never approve, so it folds as pending
        let statuses: Vec<ApprovalStatus> = chains
            .iter()
            .map(|c| c.status)
            .chain(missing_chains.iter().map(|_| ApprovalStatus::Pending))
            .collect();
        let count = (chains.len() + missing_chains.len()) as u32;
        let progress = if count == 0 {
            0
        } else {
            let total: u32 = chains.iter().map(|c| c.progress as u32).sum();
            ((2 * total + count) / (2 * count)) as u8
        };
        let with_status = |status: ApprovalStatus| -> Vec<Chain> {
            chains.iter().filter(|c| c.status == status).map(|c| c.chain).collect()
        };

        Ok(CrossChainRequestStatus {
            cross_chain_request_id: request.cross_chain_request_id.clone(),
            vault_id: request.vault_id.clone(),
            status: fold_status(&statuses),
            progress,
            approved_chains: with_status(ApprovalStatus::Approved),
            pending_chains: with_status(ApprovalStatus::Pending),
            missing_chains,
            chains,
        })
    }

    /// Prove every APPROVED chain's approval and aggregate the proofs
    ///
    /// The aggregate is `verified` once two or more chains have approved.
    pub async fn generate_cross_chain_proof(&self, cross_chain_request_id: &str) -> Result<AggregatedProof> {
        let request = self.get_cross_chain_request(cross_chain_request_id)?;

        let mut proofs = BTreeMap::new();
        for per_chain in &request.per_chain_requests {
            let approval = self.gateway.get_request(&per_chain.approval_request_id)?;
            if approval.status != ApprovalStatus::Approved {
                continue;
            }
            let signers: Vec<&str> = approval
                .received_signatures
                .iter()
                .map(|s| s.signer_address.as_str())
                .collect();
            let claim = ProofClaim {
                vault_id: request.vault_id.clone(),
                chain: per_chain.chain,
                statement: json!({
                    "crossChainRequestId": request.cross_chain_request_id,
                    "approvalRequestId": approval.id,
                    "receivedWeight": approval.received_weight(),
                    "thresholdWeight": approval.threshold_weight,
                    "signers": signers,
                }),
            };
            let proof = self.proofs.backend().generate(&claim).await?;
            proofs.insert(per_chain.chain, proof);
        }

        if proofs.is_empty() {
            return Err(Error::Validation(format!(
                "cross-chain request {} has no approved chains",
                cross_chain_request_id
            )));
        }

        let aggregated = self.proofs.aggregate_proofs(
            &request.vault_id,
            proofs,
            request.source_chain,
            Some(json!({ "crossChainRequestId": request.cross_chain_request_id })),
        )?;

        if let Some(mut entry) = self.requests.get_mut(cross_chain_request_id) {
            entry.proof_id = Some(aggregated.id.clone());
        }
        Ok(aggregated)
    }
}
