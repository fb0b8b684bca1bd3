use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::recovery::ErrorCategory;

/// Failure reported by a chain client
///
/// Each variant is already tagged with the category it belongs to. `Other`
/// carries failures the client could not type and is classified by message.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("node unreachable: {0}")]
    Unreachable(String),

    #[error("rpc rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("rpc error: {message}")]
    Rpc { message: String, transient: bool },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("contract execution failed: {0}")]
    Contract(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("client not initialized")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl ChainClientError {
    /// Category carried by the variant, `None` for untyped failures
    pub fn typed_category(&self) -> Option<ErrorCategory> {
        match self {
            ChainClientError::Network(_)
            | ChainClientError::Timeout(_)
            | ChainClientError::Unreachable(_) => Some(ErrorCategory::Network),
            ChainClientError::RateLimited(_)
            | ChainClientError::Rpc { .. }
            | ChainClientError::NotInitialized => Some(ErrorCategory::Rpc),
            ChainClientError::InvalidInput(_) => Some(ErrorCategory::Validation),
            ChainClientError::Contract(_) => Some(ErrorCategory::Contract),
            ChainClientError::Unauthorized(_) => Some(ErrorCategory::Authentication),
            ChainClientError::Bridge(_) => Some(ErrorCategory::CrossChain),
            ChainClientError::Signature(_) => Some(ErrorCategory::Signature),
            ChainClientError::Other(_) => None,
        }
    }

    /// Retryability carried by the variant, `None` for untyped failures
    pub fn typed_retryable(&self) -> Option<bool> {
        match self {
            ChainClientError::Network(_)
            | ChainClientError::Timeout(_)
            | ChainClientError::Unreachable(_)
            | ChainClientError::RateLimited(_) => Some(true),
            ChainClientError::Rpc { transient, .. } => Some(*transient),
            ChainClientError::Other(_) => None,
            _ => Some(false),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChainClientError::Network(_) => "NETWORK",
            ChainClientError::Timeout(_) => "TIMEOUT",
            ChainClientError::Unreachable(_) => "UNREACHABLE",
            ChainClientError::RateLimited(_) => "RATE_LIMITED",
            ChainClientError::Rpc { .. } => "RPC",
            ChainClientError::InvalidInput(_) => "INVALID_INPUT",
            ChainClientError::Contract(_) => "CONTRACT",
            ChainClientError::Unauthorized(_) => "UNAUTHORIZED",
            ChainClientError::Bridge(_) => "BRIDGE",
            ChainClientError::Signature(_) => "SIGNATURE",
            ChainClientError::NotInitialized => "NOT_INITIALIZED",
            ChainClientError::Other(_) => "OTHER",
        }
    }
}
