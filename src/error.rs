/*!
# Error Module

Crate-wide error type. Every public operation returns [`crate::Result`].

Classified chain failures arrive as [`BlockchainError`] inside
[`Error::Chain`]; the remaining variants are protocol-level outcomes raised by
the components themselves (unknown bridge, duplicate signer and so on).

Each variant maps onto one of the shared error categories and onto the HTTP
status class the route layer answers with:

| Variant | Category | Status |
|---|---|---|
| `Validation`, `InsufficientChains` | VALIDATION | 400 |
| `InvalidSignature` | SIGNATURE | 400 |
| `NotFound` | VALIDATION | 404 |
| `DuplicateSigner`, `AlreadyFinalized` | VALIDATION | 409 |
| `BridgeOffline` | CROSS_CHAIN | 503 |
| `Chain` | from the classified error | 502 |
| `Timeout` | NETWORK | 504 |
| `Config`, `Internal`, `Io` | UNKNOWN | 500 |
*/

use thiserror::Error;

use crate::chain::Chain;
use crate::multisig::ApprovalStatus;
use crate::recovery::{BlockchainError, ClientSafeError, ErrorCategory, ErrorClassifier};

/// Core protocol error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input rejected at the boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown bridge, transfer, request or proof
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bridge exists but is offline
    #[error("Bridge {source_chain}->{target_chain} is offline")]
    BridgeOffline { source_chain: Chain, target_chain: Chain },

    /// Signer already contributed to the request
    #[error("Signer {signer} already signed request {request_id}")]
    DuplicateSigner { request_id: String, signer: String },

    /// Request is no longer pending
    #[error("Request {request_id} is already {status}")]
    AlreadyFinalized { request_id: String, status: ApprovalStatus },

    /// Fewer than two supported chains
    #[error("Cross-chain approval needs at least 2 supported chains, got {supplied}")]
    InsufficientChains { supplied: usize },

    /// Chain client rejected the signature
    #[error("Signature from {signer} rejected by {chain}")]
    InvalidSignature { chain: Chain, signer: String },

    /// Classified chain failure
    #[error(transparent)]
    Chain(#[from] BlockchainError),

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Chain(e) => e.retryable(),
            Error::Timeout(_) => true,
            Error::BridgeOffline { .. } => true,
            Error::Io(_) => true,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::NotFound(_)
            | Error::DuplicateSigner { .. }
            | Error::AlreadyFinalized { .. }
            | Error::InsufficientChains { .. } => ErrorCategory::Validation,
            Error::InvalidSignature { .. } => ErrorCategory::Signature,
            Error::BridgeOffline { .. } => ErrorCategory::CrossChain,
            Error::Chain(e) => e.category(),
            Error::Timeout(_) => ErrorCategory::Network,
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => ErrorCategory::Unknown,
        }
    }

    /// HTTP status class for the route layer
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_)
            | Error::InsufficientChains { .. }
            | Error::InvalidSignature { .. } => 400,
            Error::NotFound(_) => 404,
            Error::DuplicateSigner { .. } | Error::AlreadyFinalized { .. } => 409,
            Error::BridgeOffline { .. } => 503,
            Error::Chain(_) => 502,
            Error::Timeout(_) => 504,
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => 500,
        }
    }

    /// Project into the shape handed to clients
    ///
    /// Internal failures are reduced to a generic message.
    pub fn to_client_safe(&self, classifier: &ErrorClassifier) -> ClientSafeError {
        if let Error::Chain(e) = self {
            return classifier.client_safe(e);
        }

        let category = self.category();
        let message = match self {
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let blockchain = match self {
            Error::InvalidSignature { chain, .. } => Some(*chain),
            Error::BridgeOffline { source_chain, .. } => Some(*source_chain),
            _ => None,
        };

        ClientSafeError {
            category,
            message,
            blockchain,
            recovery: ErrorClassifier::strategy_for(category),
            retryable: self.is_retryable(),
            correlation_id: None,
        }
    }
}
