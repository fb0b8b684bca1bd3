//! Cross-chain verification of vaults and transactions

mod protocol;

pub use protocol::{
    validate_entity_id,
    ChainVerification,
    ChainVerificationStatus,
    CrossChainVerificationResult,
    Inconsistency,
    VerificationOptions,
    VerificationProtocol,
    MAX_ENTITY_ID_LEN,
};
