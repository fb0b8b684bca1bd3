use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::chain::Chain;
use crate::clock::Clock;
use crate::error::Error;
use crate::proof::{ChainProof, ProofBackend};
use crate::telemetry;
use crate::Result;

/// Independent chain attestations needed before an aggregated proof counts
pub const MIN_CHAIN_ATTESTATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Verified,
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofStatus::Pending => f.write_str("pending"),
            ProofStatus::Verified => f.write_str("verified"),
        }
    }
}

impl ProofStatus {
    pub fn for_attestations(count: usize) -> Self {
        if count >= MIN_CHAIN_ATTESTATIONS {
            ProofStatus::Verified
        } else {
            ProofStatus::Pending
        }
    }
}

/// One proof per chain combined under a single id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedProof {
    pub id: String,
    pub vault_id: String,
    pub primary_chain: Chain,
    pub chains: Vec<Chain>,
    pub proofs: BTreeMap<Chain, ChainProof>,
    pub validated_by: Vec<Chain>,
    pub status: ProofStatus,
    pub created_at: u64,
    pub updated_at: u64,
    pub metadata: Option<serde_json::Value>,
}

/// Stores aggregated proofs and enforces the attestation threshold
pub struct ProofAggregationService {
    backend: Arc<dyn ProofBackend>,
    clock: Arc<dyn Clock>,
    proofs: DashMap<String, Arc<Mutex<AggregatedProof>>>,
}

impl ProofAggregationService {
    pub fn new(backend: Arc<dyn ProofBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            proofs: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ProofBackend> {
        &self.backend
    }

    pub fn aggregate_proofs(
        &self,
        vault_id: &str,
        proofs_by_chain: BTreeMap<Chain, ChainProof>,
        primary_chain: Chain,
        metadata: Option<serde_json::Value>,
    ) -> Result<AggregatedProof> {
        if vault_id.trim().is_empty() {
            return Err(Error::Validation("vault id is required".into()));
        }
        if proofs_by_chain.is_empty() {
            return Err(Error::Validation("at least one chain proof is required".into()));
        }
        for (chain, proof) in &proofs_by_chain {
            if proof.chain() != *chain {
                return Err(Error::Validation(format!(
                    "proof filed under {} attests {}",
                    chain,
                    proof.chain()
                )));
            }
        }

        let now = self.clock.now_ms();
        let validated_by: Vec<Chain> = proofs_by_chain.keys().copied().collect();
        let aggregated = AggregatedProof {
            id: format!("proof-{}", uuid::Uuid::new_v4().simple()),
            vault_id: vault_id.to_string(),
            primary_chain,
            chains: validated_by.clone(),
            status: ProofStatus::for_attestations(validated_by.len()),
            validated_by,
            proofs: proofs_by_chain,
            created_at: now,
            updated_at: now,
            metadata,
        };

        info!(
            proof_id = %aggregated.id,
            vault_id = %vault_id,
            chains = aggregated.validated_by.len(),
            status = %aggregated.status,
            "proof aggregated"
        );
        metrics::increment_counter!(
            telemetry::PROOFS_AGGREGATED,
            "status" => aggregated.status.to_string()
        );

        self.proofs
            .insert(aggregated.id.clone(), Arc::new(Mutex::new(aggregated.clone())));
        Ok(aggregated)
    }

    /// Attach another chain's proof and re-derive the status
    ///
    /// A chain that already validated has its proof replaced.
    pub fn add_chain_validation(&self, proof_id: &str, chain: Chain, proof: ChainProof) -> Result<AggregatedProof> {
        if proof.chain() != chain {
            return Err(Error::Validation(format!(
                "proof for {} cannot validate {}",
                proof.chain(),
                chain
            )));
        }
        let record = self.record(proof_id)?;
        let mut aggregated = record.lock();

        if !aggregated.validated_by.contains(&chain) {
            aggregated.validated_by.push(chain);
        }
        if !aggregated.chains.contains(&chain) {
            aggregated.chains.push(chain);
        }
        aggregated.proofs.insert(chain, proof);
        aggregated.updated_at = self.clock.now_ms();

        let status = ProofStatus::for_attestations(aggregated.validated_by.len());
        if status != aggregated.status {
            info!(proof_id = %proof_id, chain = %chain, from = %aggregated.status, to = %status, "proof status changed");
            aggregated.status = status;
        }
        Ok(aggregated.clone())
    }

    pub fn validate_aggregated_proof(&self, proof_id: &str) -> Result<bool> {
        let record = self.record(proof_id)?;
        let verified = record.lock().status == ProofStatus::Verified;
        Ok(verified)
    }

    pub fn get_proof(&self, proof_id: &str) -> Result<AggregatedProof> {
        let record = self.record(proof_id)?;
        let aggregated = record.lock().clone();
        Ok(aggregated)
    }

    /// Re-check every stored chain proof against the backend
    ///
    /// A backend error counts as a failed check.
    pub async fn verify_component_proofs(&self, proof_id: &str) -> Result<BTreeMap<Chain, bool>> {
        let proofs = self.get_proof(proof_id)?.proofs;
        let mut results = BTreeMap::new();

        for (chain, proof) in proofs {
            let valid = match self.backend.verify(&proof).await {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(proof_id = %proof_id, chain = %chain, error = %e, "component proof check failed");
                    false
                }
            };
            if !valid {
                warn!(proof_id = %proof_id, chain = %chain, "component proof invalid");
            }
            results.insert(chain, valid);
        }

        Ok(results)
    }

    fn record(&self, proof_id: &str) -> Result<Arc<Mutex<AggregatedProof>>> {
        self.proofs
            .get(proof_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("proof {}", proof_id)))
    }
}
