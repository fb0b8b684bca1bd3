//! Per-chain proofs and their aggregation
//!
//! An [`AggregatedProof`] is `verified` once at least
//! [`MIN_CHAIN_ATTESTATIONS`] chains have attested, `pending` before that.

mod aggregation;
mod backend;

pub use aggregation::{AggregatedProof, ProofAggregationService, ProofStatus, MIN_CHAIN_ATTESTATIONS};
pub use backend::{ChainProof, DigestProofBackend, ProofBackend, ProofClaim, ProofMetadata};
