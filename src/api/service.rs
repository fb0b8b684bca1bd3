use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::requests::{
    CreateMultisigBody,
    InitializeBridgeBody,
    SubmitSignatureBody,
    TestTransferBody,
    VerifyTransactionBody,
    VerifyVaultBody,
};
use crate::bridge::{
    AssetTransferCoordinator,
    BridgeConnection,
    BridgeRegistry,
    TransactionVerificationResult,
    TransferReceipt,
};
use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::error::Error;
use crate::failover::FailoverManager;
use crate::health::{ChainHealthMonitor, HealthPoller};
use crate::multisig::{
    CrossChainApprovalRequest,
    CrossChainMultiSigCoordinator,
    CrossChainOptions,
    CrossChainRequestStatus,
    CrossChainSignatureResult,
    MultiSignatureGateway,
};
use crate::proof::{AggregatedProof, ProofAggregationService, ProofBackend};
use crate::recovery::{ClientSafeError, ErrorClassifier};
use crate::rpc::{ChainClientSet, DefaultRetryPolicy, RetryPolicy};
use crate::verification::{CrossChainVerificationResult, VerificationProtocol};
use crate::Result;

/// Error answer of an endpoint: HTTP status plus the client-safe body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub body: ClientSafeError,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.body.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One method per REST endpoint, wired over a shared set of components
///
/// Request bodies are validated before any chain client is touched.
pub struct CrossChainService {
    classifier: Arc<ErrorClassifier>,
    monitor: Arc<ChainHealthMonitor>,
    bridges: Arc<BridgeRegistry>,
    transfers: Arc<AssetTransferCoordinator>,
    verification: Arc<VerificationProtocol>,
    gateway: Arc<MultiSignatureGateway>,
    proofs: Arc<ProofAggregationService>,
    coordinator: Arc<CrossChainMultiSigCoordinator>,
    failover: Arc<FailoverManager>,
}

impl CrossChainService {
    pub fn new(
        config: ProtocolConfig,
        clients: ChainClientSet,
        proof_backend: Arc<dyn ProofBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let classifier = Arc::new(ErrorClassifier::with_clock(clock.clone()));
        let retry: Arc<dyn RetryPolicy> = Arc::new(DefaultRetryPolicy::new(config.retry.clone()));

        let monitor = Arc::new(ChainHealthMonitor::new(
            clients.clone(),
            clock.clone(),
            config.health.clone(),
        ));
        let bridges = Arc::new(BridgeRegistry::new(
            config.chains.clone(),
            config.health.degraded_latency_ms,
            clock.clone(),
        ));
        let transfers = Arc::new(AssetTransferCoordinator::new(
            bridges.clone(),
            clients.clone(),
            classifier.clone(),
            retry.clone(),
            config.chains.clone(),
            config.bridge.clone(),
            clock.clone(),
        ));
        let verification = Arc::new(VerificationProtocol::new(
            clients.clone(),
            classifier.clone(),
            retry.clone(),
            proof_backend.clone(),
            config.chains.clone(),
            config.verification.clone(),
            clock.clone(),
        ));
        let gateway = Arc::new(MultiSignatureGateway::new(
            clients.clone(),
            classifier.clone(),
            retry.clone(),
            config.multisig.clone(),
            clock.clone(),
        ));
        let proofs = Arc::new(ProofAggregationService::new(proof_backend, clock.clone()));
        let coordinator = Arc::new(CrossChainMultiSigCoordinator::new(
            gateway.clone(),
            proofs.clone(),
            clients,
            classifier.clone(),
            retry,
            config.multisig.clone(),
            clock.clone(),
        ));
        let failover = Arc::new(FailoverManager::new(
            monitor.clone(),
            bridges.clone(),
            verification.clone(),
            coordinator.clone(),
            classifier.clone(),
            config.failover.roles.clone(),
            clock,
        ));

        Ok(Self {
            classifier,
            monitor,
            bridges,
            transfers,
            verification,
            gateway,
            proofs,
            coordinator,
            failover,
        })
    }

    /// Start periodic health probes feeding bridge re-evaluation
    pub fn spawn_health_poller(&self) -> HealthPoller {
        HealthPoller::spawn(self.monitor.clone(), self.bridges.clone(), self.transfers.clone())
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    pub fn monitor(&self) -> &Arc<ChainHealthMonitor> {
        &self.monitor
    }

    pub fn bridges(&self) -> &Arc<BridgeRegistry> {
        &self.bridges
    }

    pub fn transfers(&self) -> &Arc<AssetTransferCoordinator> {
        &self.transfers
    }

    pub fn verification(&self) -> &Arc<VerificationProtocol> {
        &self.verification
    }

    pub fn gateway(&self) -> &Arc<MultiSignatureGateway> {
        &self.gateway
    }

    pub fn proofs(&self) -> &Arc<ProofAggregationService> {
        &self.proofs
    }

    pub fn coordinator(&self) -> &Arc<CrossChainMultiSigCoordinator> {
        &self.coordinator
    }

    pub fn failover(&self) -> &Arc<FailoverManager> {
        &self.failover
    }

    /// `GET /bridge-status`
    pub fn bridge_statuses(&self) -> Vec<BridgeConnection> {
        self.bridges.get_bridge_statuses()
    }

    /// `GET /bridge-status/{source}/{target}`
    pub fn bridge_status(&self, source: &str, target: &str) -> ApiResult<BridgeConnection> {
        let body = InitializeBridgeBody {
            source_chain: source.to_string(),
            target_chain: target.to_string(),
        };
        self.respond("bridge-status", || {
            let (source, target) = body.validate()?;
            self.bridges.get_bridge_status(source, target)
        })
    }

    /// `POST /initialize-bridge`
    pub fn initialize_bridge(&self, body: &InitializeBridgeBody) -> ApiResult<BridgeConnection> {
        self.respond("initialize-bridge", || {
            let (source, target) = body.validate()?;
            self.bridges.initialize_bridge(source, target)
        })
    }

    /// `POST /test-transfer`
    pub fn test_transfer(&self, body: &TestTransferBody) -> ApiResult<TransferReceipt> {
        self.respond("test-transfer", || {
            let request = body.validate()?;
            self.transfers.transfer_asset(&request)
        })
    }

    /// `POST /verify-bridge-transaction`
    pub async fn verify_bridge_transaction(
        &self,
        body: &VerifyTransactionBody,
    ) -> ApiResult<TransactionVerificationResult> {
        let outcome = match body.validate() {
            Ok((id, source, target)) => self.transfers.verify_transaction(&id, source, target).await,
            Err(e) => Err(e),
        };
        self.finish("verify-bridge-transaction", outcome)
    }

    /// `POST /security/create-multisig-request`
    pub async fn create_multisig_request(
        &self,
        body: &CreateMultisigBody,
    ) -> ApiResult<CrossChainApprovalRequest> {
        let outcome = match body.validate() {
            Ok(request) => {
                self.coordinator
                    .create_cross_chain_approval_request(
                        &request.vault_id,
                        &request.creator_id,
                        request.source_chain,
                        &request.secondary_chains,
                        request.approval_type,
                        request.transaction_data,
                        request.required_confirmations,
                        CrossChainOptions::default(),
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        self.finish("create-multisig-request", outcome)
    }

    /// `GET /security/multisig-status/{requestId}`
    pub fn multisig_status(&self, request_id: &str) -> ApiResult<CrossChainRequestStatus> {
        self.respond("multisig-status", || {
            self.coordinator.get_cross_chain_request_status(request_id)
        })
    }

    /// `POST /security/submit-signature`
    pub async fn submit_signature(
        &self,
        body: &SubmitSignatureBody,
    ) -> ApiResult<CrossChainSignatureResult> {
        let outcome = match body.validate() {
            Ok((request_id, signer, signatures, method)) => {
                self.coordinator
                    .verify_cross_chain_signature(&request_id, &signer, &signatures, method)
                    .await
            }
            Err(e) => Err(e),
        };
        self.finish("submit-signature", outcome)
    }

    /// `GET /security/generate-zk-proof/{requestId}`
    pub async fn generate_proof(&self, request_id: &str) -> ApiResult<AggregatedProof> {
        let outcome = self.coordinator.generate_cross_chain_proof(request_id).await;
        self.finish("generate-zk-proof", outcome)
    }

    /// `POST /cross-chain/verify-vault`
    pub async fn verify_vault(&self, body: &VerifyVaultBody) -> ApiResult<CrossChainVerificationResult> {
        let outcome = match body.validate() {
            Ok((vault_id, source, targets, options)) => {
                self.verification
                    .verify_across_chains(&vault_id, source, &targets, &options)
                    .await
            }
            Err(e) => Err(e),
        };
        self.finish("verify-vault", outcome)
    }

    fn respond<T>(&self, endpoint: &str, f: impl FnOnce() -> Result<T>) -> ApiResult<T> {
        self.finish(endpoint, f())
    }

    fn finish<T>(&self, endpoint: &str, outcome: Result<T>) -> ApiResult<T> {
        outcome.map_err(|e| self.to_api_error(endpoint, e))
    }

    fn to_api_error(&self, endpoint: &str, error: Error) -> ApiError {
        let status = error.status_code();
        if status >= 500 {
            warn!(endpoint, status, error = %error, "request failed");
        } else {
            debug!(endpoint, status, error = %error, "request rejected");
        }
        ApiError {
            status,
            body: error.to_client_safe(&self.classifier),
        }
    }
}
