use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::chain::Chain;

/// Metadata key carrying the shared cross-chain request id
pub const CROSS_CHAIN_REQUEST_ID: &str = "crossChainRequestId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalType {
    Withdrawal,
    Transfer,
    AccessChange,
    ConfigurationChange,
    Recovery,
    Emergency,
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalType::Withdrawal => "WITHDRAWAL",
            ApprovalType::Transfer => "TRANSFER",
            ApprovalType::AccessChange => "ACCESS_CHANGE",
            ApprovalType::ConfigurationChange => "CONFIGURATION_CHANGE",
            ApprovalType::Recovery => "RECOVERY",
            ApprovalType::Emergency => "EMERGENCY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl ApprovalStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
            ApprovalStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// How a signer's signature was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureVerificationMethod {
    Standard,
    ZeroKnowledge,
    HardwareKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub signer_address: String,
    pub signature: String,
    pub weight: u32,
    pub method: SignatureVerificationMethod,
    pub timestamp: u64,
    pub meta: Option<serde_json::Value>,
}

/// Chain-scoped payload being approved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub chain: Chain,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalConfig {
    pub custom_threshold_weight: u32,
    /// Lifetime of the request, the configured default when unset
    pub expiration: Option<Duration>,
    /// Weight per signer address; unlisted signers carry the default weight
    pub signer_weights: BTreeMap<String, u32>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            custom_threshold_weight: 1,
            expiration: None,
            signer_weights: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Chain-scoped approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub vault_id: String,
    pub creator_id: String,
    pub approval_type: ApprovalType,
    pub transaction_data: TransactionData,
    pub threshold_weight: u32,
    pub signer_weights: BTreeMap<String, u32>,
    pub received_signatures: Vec<SignatureRecord>,
    pub status: ApprovalStatus,
    pub created_at: u64,
    pub updated_at: u64,
    pub expires_at: Option<u64>,
    /// Reference returned by the chain when the request was registered
    pub on_chain_reference: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ApprovalRequest {
    /// Sum of tallied weights, widened so any number of `u32` weights fits
    pub fn received_weight(&self) -> u64 {
        self.received_signatures.iter().map(|s| u64::from(s.weight)).sum()
    }

    /// Configured weight for a signer, matched case-insensitively
    pub fn weight_of(&self, signer_address: &str) -> Option<u32> {
        self.signer_weights
            .get(&signer_address.to_ascii_lowercase())
            .copied()
    }

    /// `min(100, round(100 * received / threshold))`
    pub fn progress(&self) -> u8 {
        let threshold = self.threshold_weight.max(1) as u64;
        let received = self.received_weight();
        ((200 * received + threshold) / (2 * threshold)).min(100) as u8
    }

    pub fn has_signed(&self, signer_address: &str) -> bool {
        self.received_signatures
            .iter()
            .any(|s| s.signer_address.eq_ignore_ascii_case(signer_address))
    }

    pub fn cross_chain_request_id(&self) -> Option<&str> {
        self.metadata
            .get(CROSS_CHAIN_REQUEST_ID)
            .and_then(|v| v.as_str())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.status == ApprovalStatus::Pending
            && self.expires_at.map(|at| now > at).unwrap_or(false)
    }
}
