pub mod chain;
pub mod clock;
pub mod config;
pub mod telemetry;
pub mod rpc;
pub mod recovery;
pub mod health;
pub mod bridge;
pub mod verification;
pub mod proof;
pub mod multisig;
pub mod failover;
pub mod api;

// Re-exports
pub use chain::{Chain, ChainRole, RoleAssignment, SecurityLevel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProtocolConfig;
pub use rpc::{ChainClient, ChainClientSet};
pub use recovery::{BlockchainError, ErrorCategory, ErrorClassifier, RecoveryStrategy};
pub use health::ChainHealthMonitor;
pub use bridge::{AssetTransferCoordinator, BridgeRegistry, BridgeStatus};
pub use verification::VerificationProtocol;
pub use proof::ProofAggregationService;
pub use multisig::{CrossChainMultiSigCoordinator, MultiSignatureGateway};
pub use failover::FailoverManager;
pub use api::CrossChainService;

// Core types
pub type Result<T> = std::result::Result<T, Error>;
pub use error::Error;

pub mod error;
