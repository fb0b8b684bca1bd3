use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::chain::Chain;
use crate::clock::{Clock, SystemClock};
use crate::rpc::ChainClientError;

/// Category every failure is sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Network,
    Validation,
    Authentication,
    Contract,
    CrossChain,
    Signature,
    Rpc,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::Contract => "CONTRACT",
            ErrorCategory::CrossChain => "CROSS_CHAIN",
            ErrorCategory::Signature => "SIGNATURE",
            ErrorCategory::Rpc => "RPC",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery action selected for a classified error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Repeat the call against another RPC endpoint
    AlternateRpc,
    /// Hand the operation to the failover manager
    FallbackChain,
    /// Needs an operator
    ManualResolution,
    /// Nothing to do
    None,
}

/// Classified chain failure
///
/// Only [`ErrorClassifier`] builds these.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category} error: {message}")]
pub struct BlockchainError {
    category: ErrorCategory,
    blockchain: Option<Chain>,
    message: String,
    code: Option<String>,
    retryable: bool,
    timestamp: u64,
    correlation_id: String,
    context: BTreeMap<String, String>,
}

impl BlockchainError {
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn blockchain(&self) -> Option<Chain> {
        self.blockchain
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Attach a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Projection of a classified error that is safe to hand to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSafeError {
    pub category: ErrorCategory,
    pub message: String,
    pub blockchain: Option<Chain>,
    pub recovery: RecoveryStrategy,
    pub retryable: bool,
    pub correlation_id: Option<String>,
}

/// Sorts failures into categories and picks the recovery path
pub struct ErrorClassifier {
    clock: Arc<dyn Clock>,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Classify a chain client failure
    pub fn classify(&self, chain: Option<Chain>, err: &ChainClientError) -> BlockchainError {
        let message = err.to_string();
        let category = err
            .typed_category()
            .unwrap_or_else(|| Self::category_for_message(&message));
        let retryable = err
            .typed_retryable()
            .unwrap_or_else(|| Self::is_retryable_message(category, &message));
        self.build(chain, category, message, Some(err.code().to_string()), retryable)
    }

    /// Classify an untyped failure by its message
    pub fn classify_message(&self, chain: Option<Chain>, message: &str) -> BlockchainError {
        let category = Self::category_for_message(message);
        let retryable = Self::is_retryable_message(category, message);
        self.build(chain, category, message.to_string(), None, retryable)
    }

    fn build(
        &self,
        chain: Option<Chain>,
        category: ErrorCategory,
        message: String,
        code: Option<String>,
        retryable: bool,
    ) -> BlockchainError {
        let err = BlockchainError {
            category,
            blockchain: chain,
            message,
            code,
            retryable,
            timestamp: self.clock.now_ms(),
            correlation_id: format!("err-{}", uuid::Uuid::new_v4().simple()),
            context: BTreeMap::new(),
        };

        let chain_label = chain.map(|c| c.as_str()).unwrap_or("-");
        if retryable {
            warn!(category = %category, chain = chain_label, correlation_id = %err.correlation_id, "{}", err.message);
        } else {
            error!(category = %category, chain = chain_label, correlation_id = %err.correlation_id, "{}", err.message);
        }
        metrics::increment_counter!(
            crate::telemetry::ERRORS_CLASSIFIED,
            "category" => category.as_str()
        );
        err
    }

    /// Keyword heuristics for failures that arrive untyped
    pub fn category_for_message(message: &str) -> ErrorCategory {
        let msg = message.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| msg.contains(w));

        if has(&["network", "timeout", "timed out", "unreachable", "connection"]) {
            ErrorCategory::Network
        } else if has(&["rpc", "rate limit", "rate-limit", "too many requests"]) {
            ErrorCategory::Rpc
        } else if has(&["invalid", "validation", "format"]) {
            ErrorCategory::Validation
        } else if has(&["contract", "execution", "reverted"]) {
            ErrorCategory::Contract
        } else if has(&["unauthorized", "forbidden"]) {
            ErrorCategory::Authentication
        } else if has(&["bridge", "cross-chain", "cross chain"]) {
            ErrorCategory::CrossChain
        } else if has(&["signature", "signing"]) {
            ErrorCategory::Signature
        } else {
            ErrorCategory::Unknown
        }
    }

    /// NETWORK always retries; RPC only for transient phrasing
    pub fn is_retryable_message(category: ErrorCategory, message: &str) -> bool {
        match category {
            ErrorCategory::Network => true,
            ErrorCategory::Rpc => {
                let msg = message.to_lowercase();
                ["timeout", "timed out", "rate limit", "rate-limit", "too many requests", "try again"]
                    .iter()
                    .any(|w| msg.contains(w))
            }
            _ => false,
        }
    }

    pub fn recovery_strategy(&self, err: &BlockchainError) -> RecoveryStrategy {
        Self::strategy_for(err.category)
    }

    pub fn strategy_for(category: ErrorCategory) -> RecoveryStrategy {
        match category {
            ErrorCategory::Network => RecoveryStrategy::Retry,
            ErrorCategory::Rpc => RecoveryStrategy::AlternateRpc,
            ErrorCategory::CrossChain => RecoveryStrategy::FallbackChain,
            ErrorCategory::Contract | ErrorCategory::Validation => RecoveryStrategy::ManualResolution,
            _ => RecoveryStrategy::None,
        }
    }

    /// Whether another attempt is worth making
    pub fn should_attempt_recovery(&self, err: &BlockchainError, attempts: u32, max_attempts: u32) -> bool {
        err.retryable && attempts < max_attempts
    }

    /// Exponential backoff for the given zero-based attempt, capped
    pub fn recovery_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn client_safe(&self, err: &BlockchainError) -> ClientSafeError {
        ClientSafeError {
            category: err.category,
            message: err.message.clone(),
            blockchain: err.blockchain,
            recovery: self.recovery_strategy(err),
            retryable: err.retryable,
            correlation_id: Some(err.correlation_id.clone()),
        }
    }
}
