use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::chain::Chain;
use crate::error::Error;
use crate::rpc::ChainClientError;
use crate::Result;

/// What an entity id refers to on a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Vault,
    Transaction,
}

/// On-chain record of a vault or transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    /// State hash as seen by the chain
    pub hash: String,
    pub block_number: Option<u64>,
    pub confirmations: u32,
}

/// Health probe answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHealthReport {
    pub latest_block: u64,
    /// Latency measured by the node itself, if it reports one
    pub latency_ms: Option<u64>,
}

/// Capability interface over one chain's RPC endpoint
///
/// Implementations return typed [`ChainClientError`]s. One implementation
/// exists per chain; tests swap in [`FakeChainClient`](crate::rpc::FakeChainClient).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain served by this client
    fn chain(&self) -> Chain;

    async fn initialize(&self) -> std::result::Result<(), ChainClientError>;

    fn is_initialized(&self) -> bool;

    /// Look up a vault or transaction, `None` if the chain has no record
    async fn lookup(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> std::result::Result<Option<EntityRecord>, ChainClientError>;

    async fn get_transaction(
        &self,
        id: &str,
    ) -> std::result::Result<Option<EntityRecord>, ChainClientError> {
        self.lookup(EntityKind::Transaction, id).await
    }

    /// Confirmations observed for a transaction, 0 if not yet seen
    async fn get_confirmations(&self, transaction_id: &str) -> std::result::Result<u32, ChainClientError>;

    async fn verify_signature(
        &self,
        message: &[u8],
        signature: &str,
        address: &str,
    ) -> std::result::Result<bool, ChainClientError>;

    /// Register a signature request on chain, returning its on-chain reference
    async fn create_signature_request(
        &self,
        id: &str,
        data: &serde_json::Value,
    ) -> std::result::Result<String, ChainClientError>;

    async fn get_health(&self) -> std::result::Result<ChainHealthReport, ChainClientError>;
}

/// One client per chain
#[derive(Clone, Default)]
pub struct ChainClientSet {
    clients: HashMap<Chain, Arc<dyn ChainClient>>,
}

impl ChainClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.insert(client);
        self
    }

    /// Register a client under the chain it serves, replacing any previous one
    pub fn insert(&mut self, client: Arc<dyn ChainClient>) {
        self.clients.insert(client.chain(), client);
    }

    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainClient>> {
        self.clients
            .get(&chain)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no client configured for {}", chain)))
    }

    pub fn contains(&self, chain: Chain) -> bool {
        self.clients.contains_key(&chain)
    }

    /// Configured chains in chain order
    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.clients.keys().copied().collect();
        chains.sort();
        chains
    }

    /// Initialize every client that is not yet initialized
    ///
    /// Failures are reported per chain and do not stop the others.
    pub async fn initialize_all(&self) -> HashMap<Chain, std::result::Result<(), ChainClientError>> {
        let mut results = HashMap::new();
        for chain in self.chains() {
            let Some(client) = self.clients.get(&chain) else { continue };
            if client.is_initialized() {
                results.insert(chain, Ok(()));
                continue;
            }
            let outcome = client.initialize().await;
            match &outcome {
                Ok(()) => info!(chain = %chain, "chain client initialized"),
                Err(e) => warn!(chain = %chain, error = %e, "chain client failed to initialize"),
            }
            results.insert(chain, outcome);
        }
        results
    }
}
