use std::collections::BTreeMap;
use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MultisigConfig;
use crate::error::Error;
use crate::multisig::{
    ApprovalConfig,
    ApprovalRequest,
    ApprovalStatus,
    ApprovalType,
    SignatureRecord,
    SignatureVerificationMethod,
    TransactionData,
};
use crate::recovery::ErrorClassifier;
use crate::rpc::{with_retry, ChainClientSet, RetryPolicy};
use crate::telemetry;
use crate::verification::validate_entity_id;
use crate::Result;

/// Owner of every chain-scoped approval request
///
/// ```text
/// PENDING --(weight >= threshold)--> APPROVED
/// PENDING --(reject)---------------> REJECTED
/// PENDING --(now > expires_at)-----> EXPIRED
/// any     --(cancel)---------------> CANCELLED
/// ```
///
/// Each request has its own lock. Signature checks run against the chain
/// client with no lock held; the tally re-checks the request afterwards so
/// concurrent submissions cannot both cross the threshold or sign twice.
pub struct MultiSignatureGateway {
    clients: ChainClientSet,
    classifier: Arc<ErrorClassifier>,
    retry: Arc<dyn RetryPolicy>,
    config: MultisigConfig,
    clock: Arc<dyn Clock>,
    requests: DashMap<String, Arc<Mutex<ApprovalRequest>>>,
}

impl MultiSignatureGateway {
    pub fn new(
        clients: ChainClientSet,
        classifier: Arc<ErrorClassifier>,
        retry: Arc<dyn RetryPolicy>,
        config: MultisigConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clients,
            classifier,
            retry,
            config,
            clock,
            requests: DashMap::new(),
        }
    }

    /// Create a request and register it on the transaction's chain
    pub async fn create_approval_request(
        &self,
        vault_id: &str,
        creator_id: &str,
        approval_type: ApprovalType,
        transaction_data: TransactionData,
        config: ApprovalConfig,
    ) -> Result<ApprovalRequest> {
        validate_entity_id(vault_id)?;
        if creator_id.trim().is_empty() {
            return Err(Error::Validation("creator id is required".into()));
        }
        if config.custom_threshold_weight < 1 {
            return Err(Error::Validation("threshold weight must be at least 1".into()));
        }
        if config.signer_weights.values().any(|w| *w == 0) {
            return Err(Error::Validation("signer weights must be at least 1".into()));
        }
        let mut signer_weights = BTreeMap::new();
        for (signer, weight) in config.signer_weights {
            let key = signer.to_ascii_lowercase();
            if signer_weights.insert(key, weight).is_some() {
                return Err(Error::Validation(format!("signer {} is listed twice", signer)));
            }
        }

        let chain = transaction_data.chain;
        let id = format!("req-{}", uuid::Uuid::new_v4().simple());
        let client = self.clients.get(chain)?;
        let on_chain_reference = with_retry(
            chain,
            self.config.call_timeout,
            self.retry.as_ref(),
            &self.classifier,
            || client.create_signature_request(&id, &transaction_data.data),
        )
        .await?;

        let now = self.clock.now_ms();
        let lifetime = config.expiration.unwrap_or(self.config.default_expiration);
        let request = ApprovalRequest {
            id: id.clone(),
            vault_id: vault_id.to_string(),
            creator_id: creator_id.to_string(),
            approval_type,
            transaction_data,
            threshold_weight: config.custom_threshold_weight,
            signer_weights,
            received_signatures: Vec::new(),
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: Some(now.saturating_add(u64::try_from(lifetime.as_millis()).unwrap_or(u64::MAX))),
            on_chain_reference: Some(on_chain_reference),
            metadata: config.metadata,
        };

        info!(
            request_id = %id,
            vault_id = %vault_id,
            chain = %chain,
            approval_type = %approval_type,
            threshold = request.threshold_weight,
            "approval request created"
        );
        self.requests.insert(id, Arc::new(Mutex::new(request.clone())));
        Ok(request)
    }

    /// Verify a signature through the chain client and tally it
    pub async fn submit_signature(
        &self,
        request_id: &str,
        signer_address: &str,
        signature: &str,
        method: SignatureVerificationMethod,
        meta: Option<serde_json::Value>,
    ) -> Result<ApprovalRequest> {
        if signer_address.trim().is_empty() || signature.trim().is_empty() {
            return Err(Error::Validation("signer address and signature are required".into()));
        }

        let (chain, message) = {
            let record = self.record(request_id)?;
            let mut request = record.lock();
            self.expire_if_due(&mut request);
            Self::check_signable(&request, signer_address)?;
            let message = Self::signing_message(&request)?;
            (request.transaction_data.chain, message)
        };

        let client = self.clients.get(chain)?;
        let valid = with_retry(
            chain,
            self.config.call_timeout,
            self.retry.as_ref(),
            &self.classifier,
            || client.verify_signature(&message, signature, signer_address),
        )
        .await?;

        if !valid {
            warn!(request_id = %request_id, chain = %chain, signer = %signer_address, "signature rejected");
            return Err(Error::InvalidSignature {
                chain,
                signer: signer_address.to_string(),
            });
        }

        self.tally_verified_signature(request_id, signer_address, signature, method, meta)
    }

    /// Add a signature the chain client already accepted
    pub(crate) fn tally_verified_signature(
        &self,
        request_id: &str,
        signer_address: &str,
        signature: &str,
        method: SignatureVerificationMethod,
        meta: Option<serde_json::Value>,
    ) -> Result<ApprovalRequest> {
        let record = self.record(request_id)?;
        let mut request = record.lock();
        self.expire_if_due(&mut request);
        Self::check_signable(&request, signer_address)?;

        let now = self.clock.now_ms();
        let weight = request
            .weight_of(signer_address)
            .unwrap_or(self.config.default_signer_weight);
        request.received_signatures.push(SignatureRecord {
            signer_address: signer_address.to_string(),
            signature: signature.to_string(),
            weight,
            method,
            timestamp: now,
            meta,
        });
        request.updated_at = now;

        let received = request.received_weight();
        debug!(request_id = %request_id, signer = %signer_address, weight, received, threshold = request.threshold_weight, "signature tallied");
        metrics::increment_counter!(
            telemetry::SIGNATURES_TALLIED,
            "chain" => request.transaction_data.chain.as_str()
        );

        if received >= u64::from(request.threshold_weight) {
            Self::transition(&mut request, ApprovalStatus::Approved);
        }
        Ok(request.clone())
    }

    pub fn reject_request(&self, request_id: &str, rejected_by: &str, reason: Option<&str>) -> Result<ApprovalRequest> {
        let record = self.record(request_id)?;
        let mut request = record.lock();
        self.expire_if_due(&mut request);
        if request.status.is_final() {
            return Err(Error::AlreadyFinalized {
                request_id: request_id.to_string(),
                status: request.status,
            });
        }

        request.metadata.insert("rejectedBy".into(), rejected_by.into());
        if let Some(reason) = reason {
            request.metadata.insert("rejectionReason".into(), reason.into());
        }
        request.updated_at = self.clock.now_ms();
        Self::transition(&mut request, ApprovalStatus::Rejected);
        Ok(request.clone())
    }

    /// Cancel from any state; cancelling twice is a no-op
    pub fn cancel_request(&self, request_id: &str, cancelled_by: &str) -> Result<ApprovalRequest> {
        let record = self.record(request_id)?;
        let mut request = record.lock();
        if request.status != ApprovalStatus::Cancelled {
            request.metadata.insert("cancelledBy".into(), cancelled_by.into());
            request.updated_at = self.clock.now_ms();
            Self::transition(&mut request, ApprovalStatus::Cancelled);
        }
        Ok(request.clone())
    }

    /// Current state, expiring the request first if it is overdue
    pub fn get_request(&self, request_id: &str) -> Result<ApprovalRequest> {
        let record = self.record(request_id)?;
        let mut request = record.lock();
        self.expire_if_due(&mut request);
        Ok(request.clone())
    }

    /// Expire every overdue pending request, returning their ids
    pub fn expire_stale_requests(&self) -> Vec<String> {
        let records: Vec<Arc<Mutex<ApprovalRequest>>> =
            self.requests.iter().map(|entry| entry.value().clone()).collect();

        let mut expired = Vec::new();
        for record in records {
            let mut request = record.lock();
            if self.expire_if_due(&mut request) {
                expired.push(request.id.clone());
            }
        }
        expired.sort();
        expired
    }

    /// Requests for a vault, oldest first
    pub fn list_for_vault(&self, vault_id: &str) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> = self
            .requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|record| {
                let mut request = record.lock();
                if request.vault_id != vault_id {
                    return None;
                }
                self.expire_if_due(&mut request);
                Some(request.clone())
            })
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        requests
    }

    /// Bytes a signer signs: the canonical JSON of the transaction payload
    pub fn signing_message(request: &ApprovalRequest) -> Result<Vec<u8>> {
        serde_json::to_vec(&request.transaction_data.data)
            .map_err(|e| Error::Internal(format!("transaction data encoding failed: {}", e)))
    }

    fn record(&self, request_id: &str) -> Result<Arc<Mutex<ApprovalRequest>>> {
        self.requests
            .get(request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("approval request {}", request_id)))
    }

    fn check_signable(request: &ApprovalRequest, signer_address: &str) -> Result<()> {
        if request.status != ApprovalStatus::Pending {
            return Err(Error::AlreadyFinalized {
                request_id: request.id.clone(),
                status: request.status,
            });
        }
        if request.has_signed(signer_address) {
            return Err(Error::DuplicateSigner {
                request_id: request.id.clone(),
                signer: signer_address.to_string(),
            });
        }
        Ok(())
    }

    fn expire_if_due(&self, request: &mut ApprovalRequest) -> bool {
        let now = self.clock.now_ms();
        if request.is_expired_at(now) {
            request.updated_at = now;
            Self::transition(request, ApprovalStatus::Expired);
            return true;
        }
        false
    }

    fn transition(request: &mut ApprovalRequest, to: ApprovalStatus) {
        info!(
            request_id = %request.id,
            chain = %request.transaction_data.chain,
            from = %request.status,
            to = %to,
            received = request.received_weight(),
            threshold = request.threshold_weight,
            "approval request status changed"
        );
        metrics::increment_counter!(
            telemetry::APPROVAL_TRANSITIONS,
            "to" => to.to_string()
        );
        request.status = to;
    }
}
