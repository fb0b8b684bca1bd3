use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::bridge::AssetTransferRequest;
use crate::chain::Chain;
use crate::error::Error;
use crate::multisig::{ApprovalType, SignatureVerificationMethod};
use crate::rpc::EntityKind;
use crate::verification::{validate_entity_id, VerificationOptions};
use crate::Result;

fn parse_chain(field: &str, raw: &str) -> Result<Chain> {
    raw.parse::<Chain>()
        .map_err(|_| Error::Validation(format!("{}: unsupported chain {:?}", field, raw)))
}

fn parse_chains(field: &str, raw: &[String]) -> Result<Vec<Chain>> {
    raw.iter().map(|c| parse_chain(field, c)).collect()
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn parse_enum<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> Result<T> {
    let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| Error::Validation(format!("{}: unknown value {:?}", field, raw)))
}

/// `POST /initialize-bridge`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBridgeBody {
    pub source_chain: String,
    pub target_chain: String,
}

impl InitializeBridgeBody {
    pub fn validate(&self) -> Result<(Chain, Chain)> {
        Ok((
            parse_chain("sourceChain", &self.source_chain)?,
            parse_chain("targetChain", &self.target_chain)?,
        ))
    }
}

/// `POST /test-transfer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTransferBody {
    pub source_chain: String,
    pub target_chain: String,
    pub amount: String,
    pub asset_type: String,
    pub sender_address: String,
    pub recipient_address: String,
}

impl TestTransferBody {
    pub fn validate(&self) -> Result<AssetTransferRequest> {
        let source_chain = parse_chain("sourceChain", &self.source_chain)?;
        let target_chain = parse_chain("targetChain", &self.target_chain)?;
        require("amount", &self.amount)?;
        require("assetType", &self.asset_type)?;
        require("senderAddress", &self.sender_address)?;
        require("recipientAddress", &self.recipient_address)?;

        Ok(AssetTransferRequest {
            source_chain,
            target_chain,
            amount: self.amount.clone(),
            asset_type: self.asset_type.clone(),
            sender_address: self.sender_address.clone(),
            recipient_address: self.recipient_address.clone(),
            timestamp: None,
        })
    }
}

/// `POST /verify-bridge-transaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTransactionBody {
    pub transaction_id: String,
    pub source_chain: String,
    pub target_chain: String,
}

impl VerifyTransactionBody {
    pub fn validate(&self) -> Result<(String, Chain, Chain)> {
        validate_entity_id(&self.transaction_id)?;
        Ok((
            self.transaction_id.clone(),
            parse_chain("sourceChain", &self.source_chain)?,
            parse_chain("targetChain", &self.target_chain)?,
        ))
    }
}

/// `POST /security/create-multisig-request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultisigBody {
    pub vault_id: String,
    pub creator_id: String,
    pub source_chain: String,
    #[serde(default)]
    pub secondary_chains: Vec<String>,
    pub approval_type: String,
    #[serde(default)]
    pub transaction_data: serde_json::Value,
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,
}

fn default_required_confirmations() -> u32 {
    2
}

/// Validated form of [`CreateMultisigBody`]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMultisig {
    pub vault_id: String,
    pub creator_id: String,
    pub source_chain: Chain,
    pub secondary_chains: Vec<Chain>,
    pub approval_type: ApprovalType,
    pub transaction_data: serde_json::Value,
    pub required_confirmations: u32,
}

impl CreateMultisigBody {
    pub fn validate(&self) -> Result<CreateMultisig> {
        validate_entity_id(&self.vault_id)?;
        require("creatorId", &self.creator_id)?;
        Ok(CreateMultisig {
            vault_id: self.vault_id.clone(),
            creator_id: self.creator_id.clone(),
            source_chain: parse_chain("sourceChain", &self.source_chain)?,
            secondary_chains: parse_chains("secondaryChains", &self.secondary_chains)?,
            approval_type: parse_enum("approvalType", &self.approval_type)?,
            transaction_data: self.transaction_data.clone(),
            required_confirmations: self.required_confirmations,
        })
    }
}

/// `POST /security/submit-signature`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSignatureBody {
    pub request_id: String,
    pub signer_address: String,
    /// Signature per chain id
    pub signatures: BTreeMap<String, String>,
    pub method: Option<String>,
}

impl SubmitSignatureBody {
    pub fn validate(&self) -> Result<(String, String, BTreeMap<Chain, String>, SignatureVerificationMethod)> {
        require("requestId", &self.request_id)?;
        require("signerAddress", &self.signer_address)?;
        if self.signatures.is_empty() {
            return Err(Error::Validation("signatures is required".into()));
        }

        let mut signatures = BTreeMap::new();
        for (chain, signature) in &self.signatures {
            require("signature", signature)?;
            signatures.insert(parse_chain("signatures", chain)?, signature.clone());
        }
        let method = match &self.method {
            Some(raw) => parse_enum("method", raw)?,
            None => SignatureVerificationMethod::ZeroKnowledge,
        };

        Ok((self.request_id.clone(), self.signer_address.clone(), signatures, method))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyVaultOptionsBody {
    pub timeout_ms: Option<u64>,
    pub require_all_chains: bool,
    pub include_proofs: bool,
}

/// `POST /cross-chain/verify-vault`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyVaultBody {
    pub vault_id: String,
    pub source_chain: String,
    pub target_chains: Vec<String>,
    #[serde(default)]
    pub options: VerifyVaultOptionsBody,
}

impl VerifyVaultBody {
    pub fn validate(&self) -> Result<(String, Chain, Vec<Chain>, VerificationOptions)> {
        validate_entity_id(&self.vault_id)?;
        let source = parse_chain("sourceChain", &self.source_chain)?;
        let targets = parse_chains("targetChains", &self.target_chains)?;
        if targets.is_empty() {
            return Err(Error::Validation("targetChains is required".into()));
        }
        if self.options.timeout_ms == Some(0) {
            return Err(Error::Validation("options.timeoutMs must be positive".into()));
        }

        let options = VerificationOptions {
            timeout: self.options.timeout_ms.map(Duration::from_millis),
            require_all_chains: self.options.require_all_chains,
            include_proofs: self.options.include_proofs,
            entity_kind: EntityKind::Vault,
            ..VerificationOptions::default()
        };
        Ok((self.vault_id.clone(), source, targets, options))
    }
}
