use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chain::Chain;
use crate::rpc::{ChainClient, ChainClientError, ChainHealthReport, EntityKind, EntityRecord};

/// Deterministic in-memory chain client
///
/// Behaviour is scripted through the setters: availability, simulated
/// latency, known entities, accepted signatures and queued failures. Each
/// `get_confirmations` call returns the current count for a transaction and
/// then advances it by the configured step, so successive polls never go
/// backwards.
pub struct FakeChainClient {
    chain: Chain,
    initialized: AtomicBool,
    calls: AtomicUsize,
    state: Mutex<FakeState>,
}

struct FakeState {
    available: bool,
    delay: Duration,
    reported_latency_ms: Option<u64>,
    latest_block: u64,
    entities: HashMap<(EntityKind, String), EntityRecord>,
    confirmations: HashMap<String, u32>,
    confirmation_step: u32,
    valid_signatures: HashSet<(String, String)>,
    failures: VecDeque<ChainClientError>,
    signature_requests: u64,
}

impl FakeChainClient {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            initialized: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            state: Mutex::new(FakeState {
                available: true,
                delay: Duration::ZERO,
                reported_latency_ms: Some(50),
                latest_block: 1_000,
                entities: HashMap::new(),
                confirmations: HashMap::new(),
                confirmation_step: 4,
                valid_signatures: HashSet::new(),
                failures: VecDeque::new(),
                signature_requests: 0,
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Sleep this long before answering any call
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    /// Latency the health probe reports
    pub fn set_reported_latency(&self, latency_ms: Option<u64>) {
        self.state.lock().reported_latency_ms = latency_ms;
    }

    pub fn set_latest_block(&self, block: u64) {
        self.state.lock().latest_block = block;
    }

    pub fn set_confirmation_step(&self, step: u32) {
        self.state.lock().confirmation_step = step;
    }

    /// Record an entity with the given state hash
    pub fn insert_entity(&self, kind: EntityKind, id: &str, hash: &str) {
        let mut state = self.state.lock();
        let block = state.latest_block;
        state.entities.insert(
            (kind, id.to_string()),
            EntityRecord {
                id: id.to_string(),
                hash: hash.to_string(),
                block_number: Some(block),
                confirmations: 0,
            },
        );
    }

    /// Seed a transaction's confirmation count
    pub fn set_confirmations(&self, transaction_id: &str, confirmations: u32) {
        self.state
            .lock()
            .confirmations
            .insert(transaction_id.to_string(), confirmations);
    }

    pub fn accept_signature(&self, address: &str, signature: &str) {
        self.state
            .lock()
            .valid_signatures
            .insert((address.to_string(), signature.to_string()));
    }

    /// Fail the next call with `error`
    pub fn fail_next(&self, error: ChainClientError) {
        self.state.lock().failures.push_back(error);
    }

    /// Calls received, `chain` and `is_initialized` excluded
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), ChainClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, scripted, available) = {
            let mut state = self.state.lock();
            (state.delay, state.failures.pop_front(), state.available)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = scripted {
            return Err(error);
        }
        if !available {
            return Err(ChainClientError::Unreachable(format!("{} node unreachable", self.chain)));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn initialize(&self) -> Result<(), ChainClientError> {
        self.enter().await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn lookup(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>, ChainClientError> {
        self.enter().await?;
        let state = self.state.lock();
        let confirmations = state.confirmations.get(id).copied();
        Ok(state.entities.get(&(kind, id.to_string())).map(|record| {
            let mut record = record.clone();
            if let Some(confirmations) = confirmations {
                record.confirmations = confirmations;
            }
            record
        }))
    }

    async fn get_confirmations(&self, transaction_id: &str) -> Result<u32, ChainClientError> {
        self.enter().await?;
        let mut state = self.state.lock();
        let step = state.confirmation_step;
        let count = state
            .confirmations
            .entry(transaction_id.to_string())
            .or_insert(0);
        let current = *count;
        *count = count.saturating_add(step);
        Ok(current)
    }

    async fn verify_signature(
        &self,
        _message: &[u8],
        signature: &str,
        address: &str,
    ) -> Result<bool, ChainClientError> {
        self.enter().await?;
        let state = self.state.lock();
        Ok(state
            .valid_signatures
            .contains(&(address.to_string(), signature.to_string())))
    }

    async fn create_signature_request(
        &self,
        id: &str,
        _data: &serde_json::Value,
    ) -> Result<String, ChainClientError> {
        self.enter().await?;
        let mut state = self.state.lock();
        state.signature_requests += 1;
        Ok(format!(
            "{}-sigreq-{}-{}",
            self.chain.as_str().to_lowercase(),
            id,
            state.signature_requests
        ))
    }

    async fn get_health(&self) -> Result<ChainHealthReport, ChainClientError> {
        self.enter().await?;
        let state = self.state.lock();
        Ok(ChainHealthReport {
            latest_block: state.latest_block,
            latency_ms: state.reported_latency_ms,
        })
    }
}
