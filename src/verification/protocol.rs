use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::clock::Clock;
use crate::config::{ChainsConfig, VerificationConfig};
use crate::error::Error;
use crate::proof::{ChainProof, ProofBackend, ProofClaim};
use crate::recovery::ErrorClassifier;
use crate::rpc::{run_windowed, with_retry, ChainClientSet, EntityKind, EntityRecord, RetryPolicy};
use crate::telemetry;
use crate::Result;

/// Longest entity id accepted, in bytes
pub const MAX_ENTITY_ID_LEN: usize = 128;

/// Reject empty or oversized entity ids
pub fn validate_entity_id(entity_id: &str) -> Result<()> {
    if entity_id.trim().is_empty() {
        return Err(Error::Validation("entity id is required".into()));
    }
    if entity_id.len() > MAX_ENTITY_ID_LEN {
        return Err(Error::Validation(format!(
            "entity id is {} bytes, limit is {}",
            entity_id.len(),
            MAX_ENTITY_ID_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationOptions {
    /// Per-chain timeout, the configured default when unset
    pub timeout: Option<Duration>,
    pub require_all_chains: bool,
    pub include_proofs: bool,
    pub entity_kind: EntityKind,
    /// Confirmations a chain's record needs, overriding the default
    pub required_confirmations: BTreeMap<Chain, u32>,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            require_all_chains: false,
            include_proofs: false,
            entity_kind: EntityKind::Vault,
            required_confirmations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainVerificationStatus {
    Verified,
    Pending,
    Failed,
}

/// Outcome on one target chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub chain: Chain,
    pub status: ChainVerificationStatus,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub observed_hash: Option<String>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Target whose record disagrees with the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    pub chain: Chain,
    pub expected_hash: String,
    pub observed_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainVerificationResult {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub source_chain: Chain,
    pub success: bool,
    pub verified_on: Vec<Chain>,
    pub pending_on: Vec<Chain>,
    pub failed_on: Vec<Chain>,
    /// Percentage of target chains verified
    pub consistency_score: u8,
    pub chain_results: BTreeMap<Chain, ChainVerification>,
    pub inconsistencies: Vec<Inconsistency>,
    pub proofs: Option<BTreeMap<Chain, ChainProof>>,
    pub executed_at: u64,
}

/// Checks that an entity exists consistently across chains
///
/// The source chain is authoritative: its record, when it can be read, is
/// the reference every target's hash is compared to. Targets are verified
/// independently, a window at a time, and land in exactly one of the
/// verified, pending or failed sets.
pub struct VerificationProtocol {
    clients: ChainClientSet,
    classifier: Arc<ErrorClassifier>,
    retry: Arc<dyn RetryPolicy>,
    proofs: Arc<dyn ProofBackend>,
    chains: ChainsConfig,
    config: VerificationConfig,
    clock: Arc<dyn Clock>,
}

impl VerificationProtocol {
    pub fn new(
        clients: ChainClientSet,
        classifier: Arc<ErrorClassifier>,
        retry: Arc<dyn RetryPolicy>,
        proofs: Arc<dyn ProofBackend>,
        chains: ChainsConfig,
        config: VerificationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clients,
            classifier,
            retry,
            proofs,
            chains,
            config,
            clock,
        }
    }

    pub async fn verify_across_chains(
        &self,
        entity_id: &str,
        source: Chain,
        targets: &[Chain],
        options: &VerificationOptions,
    ) -> Result<CrossChainVerificationResult> {
        validate_entity_id(entity_id)?;
        if targets.is_empty() {
            return Err(Error::Validation("at least one target chain is required".into()));
        }

        let mut unique: Vec<Chain> = Vec::with_capacity(targets.len());
        for chain in targets {
            if !unique.contains(chain) {
                unique.push(*chain);
            }
        }

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let started = Instant::now();

        let source_record = self
            .read_record(source, options.entity_kind, entity_id, timeout)
            .await;
        let reference_hash = match &source_record {
            Ok(Some(record)) => Some(record.hash.clone()),
            Ok(None) => {
                warn!(entity_id = %entity_id, source = %source, "source chain has no record");
                None
            }
            Err(e) => {
                warn!(entity_id = %entity_id, source = %source, error = %e, "source chain unreadable");
                None
            }
        };

        let outcomes = run_windowed(unique.iter().copied(), self.config.window, |chain| {
            let reference = reference_hash.clone();
            async move {
                self.verify_on(chain, entity_id, reference.as_deref(), options, timeout)
                    .await
            }
        })
        .await;

        let mut verified_on = Vec::new();
        let mut pending_on = Vec::new();
        let mut failed_on = Vec::new();
        let mut inconsistencies = Vec::new();
        let mut chain_results = BTreeMap::new();

        for (verification, inconsistency) in outcomes {
            match verification.status {
                ChainVerificationStatus::Verified => verified_on.push(verification.chain),
                ChainVerificationStatus::Pending => pending_on.push(verification.chain),
                ChainVerificationStatus::Failed => failed_on.push(verification.chain),
            }
            if let Some(inconsistency) = inconsistency {
                inconsistencies.push(inconsistency);
            }
            chain_results.insert(verification.chain, verification);
        }

        let success = if options.require_all_chains {
            unique.iter().all(|c| verified_on.contains(c))
        } else {
            !verified_on.is_empty()
        };
        let consistency_score = ((verified_on.len() * 100 + unique.len() / 2) / unique.len()) as u8;

        let proofs = if options.include_proofs {
            Some(self.attach_proofs(entity_id, &chain_results).await)
        } else {
            None
        };

        metrics::histogram!(telemetry::VERIFICATION_DURATION, started.elapsed().as_secs_f64());
        info!(
            entity_id = %entity_id,
            source = %source,
            verified = verified_on.len(),
            pending = pending_on.len(),
            failed = failed_on.len(),
            success,
            "cross-chain verification complete"
        );

        Ok(CrossChainVerificationResult {
            entity_id: entity_id.to_string(),
            entity_kind: options.entity_kind,
            source_chain: source,
            success,
            verified_on,
            pending_on,
            failed_on,
            consistency_score,
            chain_results,
            inconsistencies,
            proofs,
            executed_at: self.clock.now_ms(),
        })
    }

    async fn read_record(
        &self,
        chain: Chain,
        kind: EntityKind,
        entity_id: &str,
        timeout: Duration,
    ) -> Result<Option<EntityRecord>> {
        let client = self.clients.get(chain)?;
        let call = with_retry(chain, timeout, self.retry.as_ref(), &self.classifier, || {
            client.lookup(kind, entity_id)
        });
        match tokio::time::timeout(timeout, call).await {
            Ok(record) => Ok(record?),
            Err(_) => Err(Error::Timeout(format!("{} lookup exceeded {}ms", chain, timeout.as_millis()))),
        }
    }

    fn required_for(&self, chain: Chain, options: &VerificationOptions) -> u32 {
        if let Some(required) = options.required_confirmations.get(&chain) {
            return *required;
        }
        match options.entity_kind {
            EntityKind::Transaction => self.chains.confirmations_for(chain),
            EntityKind::Vault => 0,
        }
    }

    async fn verify_on(
        &self,
        chain: Chain,
        entity_id: &str,
        reference_hash: Option<&str>,
        options: &VerificationOptions,
        timeout: Duration,
    ) -> (ChainVerification, Option<Inconsistency>) {
        let started = Instant::now();
        let required = self.required_for(chain, options);
        let mut verification = ChainVerification {
            chain,
            status: ChainVerificationStatus::Failed,
            confirmations: 0,
            required_confirmations: required,
            observed_hash: None,
            elapsed_ms: 0,
            error: None,
        };
        let mut inconsistency = None;

        match self.read_record(chain, options.entity_kind, entity_id, timeout).await {
            Ok(Some(record)) => {
                verification.confirmations = record.confirmations;
                verification.observed_hash = Some(record.hash.clone());
                match reference_hash {
                    Some(expected) if expected != record.hash => {
                        verification.error = Some("record hash disagrees with source chain".into());
                        inconsistency = Some(Inconsistency {
                            chain,
                            expected_hash: expected.to_string(),
                            observed_hash: record.hash,
                        });
                    }
                    _ if record.confirmations < required => {
                        verification.status = ChainVerificationStatus::Pending;
                    }
                    _ => {
                        verification.status = ChainVerificationStatus::Verified;
                    }
                }
            }
            Ok(None) => {
                verification.error = Some(format!("{} not found", entity_id));
            }
            Err(Error::Timeout(message)) => {
                verification.status = ChainVerificationStatus::Pending;
                verification.error = Some(message);
            }
            Err(Error::Chain(e)) if e.code() == Some("TIMEOUT") => {
                verification.status = ChainVerificationStatus::Pending;
                verification.error = Some(e.message().to_string());
            }
            Err(e) => {
                verification.error = Some(e.to_string());
            }
        }

        verification.elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match verification.status {
            ChainVerificationStatus::Verified => "verified",
            ChainVerificationStatus::Pending => "pending",
            ChainVerificationStatus::Failed => "failed",
        };
        debug!(chain = %chain, entity_id = %entity_id, outcome, elapsed_ms = verification.elapsed_ms, "chain verification");
        metrics::increment_counter!(
            telemetry::VERIFICATIONS,
            "chain" => chain.as_str(),
            "outcome" => outcome
        );

        (verification, inconsistency)
    }

    async fn attach_proofs(
        &self,
        entity_id: &str,
        chain_results: &BTreeMap<Chain, ChainVerification>,
    ) -> BTreeMap<Chain, ChainProof> {
        let mut proofs = BTreeMap::new();
        for (chain, verification) in chain_results {
            let claim = ProofClaim {
                vault_id: entity_id.to_string(),
                chain: *chain,
                statement: json!({
                    "status": verification.status,
                    "hash": verification.observed_hash,
                    "confirmations": verification.confirmations,
                }),
            };
            match self.proofs.generate(&claim).await {
                Ok(proof) => {
                    proofs.insert(*chain, proof);
                }
                Err(e) => {
                    warn!(chain = %chain, entity_id = %entity_id, error = %e, "proof generation failed");
                }
            }
        }
        proofs
    }
}
