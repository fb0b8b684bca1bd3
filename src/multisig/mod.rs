//! Multi-signature approvals, per chain and across chains

mod coordinator;
mod gateway;
mod types;

pub use coordinator::{
    fold_status,
    ChainApprovalProgress,
    ChainFailure,
    CrossChainApprovalRequest,
    CrossChainMultiSigCoordinator,
    CrossChainOptions,
    CrossChainRequestStatus,
    CrossChainSignatureResult,
    CrossChainStatus,
    PerChainRequest,
};
pub use gateway::MultiSignatureGateway;
pub use types::{
    ApprovalConfig,
    ApprovalRequest,
    ApprovalStatus,
    ApprovalType,
    SignatureRecord,
    SignatureVerificationMethod,
    TransactionData,
    CROSS_CHAIN_REQUEST_ID,
};
