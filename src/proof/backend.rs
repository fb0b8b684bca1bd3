use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::chain::Chain;
use crate::clock::Clock;
use crate::error::Error;
use crate::Result;

/// Statement a chain attests to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofClaim {
    pub vault_id: String,
    pub chain: Chain,
    pub statement: serde_json::Value,
}

impl ProofClaim {
    /// SHA-256 over the canonical JSON encoding
    pub fn digest(&self) -> Result<[u8; 32]> {
        let encoded = serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("claim encoding failed: {}", e)))?;
        Ok(Sha256::digest(&encoded).into())
    }
}

/// Metadata for chain proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofMetadata {
    pub generation_time: u64,
    pub proof_size: usize,
    pub backend: String,
}

/// One chain's attestation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProof {
    pub claim: ProofClaim,
    #[serde(with = "hex")]
    pub proof_data: Vec<u8>,
    pub metadata: ProofMetadata,
}

impl ChainProof {
    pub fn chain(&self) -> Chain {
        self.claim.chain
    }
}

/// Opaque proof generation capability
///
/// Aggregation only cares that a backend can produce and check a proof for
/// a claim; how the proof is built is up to the implementation.
#[async_trait]
pub trait ProofBackend: Send + Sync {
    /// Name recorded in proof metadata
    fn name(&self) -> &str;

    async fn generate(&self, claim: &ProofClaim) -> Result<ChainProof>;

    async fn verify(&self, proof: &ChainProof) -> Result<bool>;
}

/// Keyed-digest backend
///
/// A proof is `SHA-256(key || SHA-256(claim))`. Anyone holding the key can
/// verify it; any change to the claim invalidates it.
pub struct DigestProofBackend {
    key: [u8; 32],
    clock: std::sync::Arc<dyn Clock>,
}

impl DigestProofBackend {
    pub fn new(secret: impl AsRef<[u8]>, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            key: Sha256::digest(secret.as_ref()).into(),
            clock,
        }
    }

    /// Backend keyed with fresh random bytes
    pub fn ephemeral(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self::new(rand::random::<[u8; 32]>(), clock)
    }

    fn seal(&self, claim_digest: &[u8; 32]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(claim_digest);
        hasher.finalize().to_vec()
    }
}

#[async_trait]
impl ProofBackend for DigestProofBackend {
    fn name(&self) -> &str {
        "sha256-digest"
    }

    async fn generate(&self, claim: &ProofClaim) -> Result<ChainProof> {
        if claim.vault_id.trim().is_empty() {
            return Err(Error::Validation("proof claim needs a vault id".into()));
        }
        let proof_data = self.seal(&claim.digest()?);
        Ok(ChainProof {
            claim: claim.clone(),
            metadata: ProofMetadata {
                generation_time: self.clock.now_ms(),
                proof_size: proof_data.len(),
                backend: self.name().to_string(),
            },
            proof_data,
        })
    }

    async fn verify(&self, proof: &ChainProof) -> Result<bool> {
        let expected = self.seal(&proof.claim.digest()?);
        // Length is public; only the bytes are compared in constant time
        Ok(bool::from(expected.as_slice().ct_eq(proof.proof_data.as_slice())))
    }
}
