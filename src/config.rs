/*!
# Protocol Configuration

Settings for every component, grouped by section. Defaults reproduce the
production tables; a JSON document can override any section.

```rust
use crossvault_protocol::config::ProtocolConfig;
use crossvault_protocol::chain::Chain;

let config = ProtocolConfig::default();
assert_eq!(config.chains.confirmations_for(Chain::Btc), 6);
assert!(config.validate().is_ok());
```

The per-target confirmation table is fixed for the lifetime of a process:
components copy it at construction and never re-read it.
*/

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::chain::{Chain, RoleAssignment};
use crate::error::Error;
use crate::rpc::RetryConfig;
use crate::Result;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Per-chain tables
    pub chains: ChainsConfig,
    /// Health polling
    pub health: HealthConfig,
    /// Bridge behaviour
    pub bridge: BridgeConfig,
    /// Cross-chain verification
    pub verification: VerificationConfig,
    /// Chain client retries
    pub retry: RetryConfig,
    /// Multi-signature approvals
    pub multisig: MultisigConfig,
    /// Failover role table
    pub failover: FailoverConfig,
}

/// Per-chain tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// Confirmations required on a target chain
    pub confirmations_required: BTreeMap<Chain, u32>,
    /// Bridge fee charged on the source chain, in native units
    pub fees: BTreeMap<Chain, String>,
    /// Expected time between confirmations
    pub confirmation_intervals: BTreeMap<Chain, Duration>,
    /// Bridge contract address per chain
    pub bridge_contracts: BTreeMap<Chain, String>,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        let confirmations_required = Chain::ALL
            .iter()
            .map(|c| (*c, c.default_confirmations()))
            .collect();
        let confirmation_intervals = Chain::ALL
            .iter()
            .map(|c| (*c, Duration::from_millis(c.default_confirmation_interval_ms())))
            .collect();

        let mut fees = BTreeMap::new();
        fees.insert(Chain::Eth, "0.001".to_string());
        fees.insert(Chain::Sol, "0.01".to_string());
        fees.insert(Chain::Ton, "0.1".to_string());
        fees.insert(Chain::Btc, "0.0001".to_string());
        fees.insert(Chain::Polygon, "0.01".to_string());

        let mut bridge_contracts = BTreeMap::new();
        bridge_contracts.insert(Chain::Eth, "0x13C97C5A3Ea4e1D4E8a2D6eE8C8eF8e8A1C7B2D1".to_string());
        bridge_contracts.insert(Chain::Sol, "CYaDJYRqm35udQ8vkxoajSER8oaniQUcV8Vvw5BqJyo2".to_string());
        bridge_contracts.insert(Chain::Ton, "EQDJAnXDPT-NivritpEhQeP0XmG20NdeUtxgh4nUiWH-DF7M".to_string());
        bridge_contracts.insert(Chain::Btc, "tb1q8x5r3d0m2v8h0c6w9p0fz7a4l3k2j1n0s9d8f7".to_string());
        bridge_contracts.insert(Chain::Polygon, "0x2F6c1A93bD3d8E2A0c4b91E7A5f6D8C9e0B1a2C3".to_string());

        Self {
            confirmations_required,
            fees,
            confirmation_intervals,
            bridge_contracts,
        }
    }
}

impl ChainsConfig {
    pub fn confirmations_for(&self, target: Chain) -> u32 {
        self.confirmations_required
            .get(&target)
            .copied()
            .unwrap_or_else(|| target.default_confirmations())
    }

    pub fn fee_for(&self, source: Chain) -> String {
        self.fees.get(&source).cloned().unwrap_or_else(|| "0".to_string())
    }

    pub fn interval_for(&self, chain: Chain) -> Duration {
        self.confirmation_intervals
            .get(&chain)
            .copied()
            .unwrap_or_else(|| Duration::from_millis(chain.default_confirmation_interval_ms()))
    }

    pub fn contract_for(&self, chain: Chain) -> String {
        self.bridge_contracts.get(&chain).cloned().unwrap_or_default()
    }
}

/// Health polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Time between two polls
    pub poll_interval: Duration,
    /// Timeout for one health probe
    pub probe_timeout: Duration,
    /// Latency above which a bridge is degraded
    pub degraded_latency_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            degraded_latency_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// ETA multiplier on degraded bridges
    pub degraded_eta_multiplier: u32,
    /// Per-call timeout for confirmation queries
    pub call_timeout: Duration,
    /// How long a settled transfer stays queryable
    pub settled_retention: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            degraded_eta_multiplier: 3,
            call_timeout: Duration::from_secs(20),
            settled_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Default per-chain timeout
    pub timeout: Duration,
    /// Chains verified concurrently
    pub window: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            window: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultisigConfig {
    /// Chains eligible for cross-chain approval
    pub supported_chains: Vec<Chain>,
    /// Lifetime of an approval request
    pub default_expiration: Duration,
    /// Threshold on the source chain
    pub source_threshold: u32,
    /// Threshold on every other chain
    pub secondary_threshold: u32,
    /// Weight of a signer without an explicit weight
    pub default_signer_weight: u32,
    /// Per-call timeout for signature checks
    pub call_timeout: Duration,
    /// Chains fanned out concurrently
    pub window: usize,
}

impl Default for MultisigConfig {
    fn default() -> Self {
        Self {
            supported_chains: Chain::ALL.to_vec(),
            default_expiration: Duration::from_secs(24 * 60 * 60),
            source_threshold: 2,
            secondary_threshold: 1,
            default_signer_weight: 1,
            call_timeout: Duration::from_secs(20),
            window: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Role held by each chain
    pub roles: RoleAssignment,
}

impl ProtocolConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (chain, confirmations) in &self.chains.confirmations_required {
            if *confirmations == 0 {
                return Err(Error::Config(format!("{} confirmations cannot be 0", chain)));
            }
        }

        if self.health.poll_interval.is_zero() {
            return Err(Error::Config("Health poll interval cannot be 0".into()));
        }
        if self.health.probe_timeout.is_zero() {
            return Err(Error::Config("Health probe timeout cannot be 0".into()));
        }

        if self.bridge.degraded_eta_multiplier == 0 {
            return Err(Error::Config("Degraded ETA multiplier cannot be 0".into()));
        }

        if self.verification.window == 0 || self.multisig.window == 0 {
            return Err(Error::Config("Concurrency window cannot be 0".into()));
        }
        if self.verification.timeout.is_zero() {
            return Err(Error::Config("Verification timeout cannot be 0".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config("Retry attempts cannot be 0".into()));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(Error::Config("Backoff factor must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_factor) {
            return Err(Error::Config("Jitter factor must be in [0, 1)".into()));
        }

        if self.multisig.supported_chains.len() < 2 {
            return Err(Error::Config("Multisig needs at least 2 supported chains".into()));
        }
        if self.multisig.source_threshold == 0
            || self.multisig.secondary_threshold == 0
            || self.multisig.default_signer_weight == 0
        {
            return Err(Error::Config("Thresholds and signer weight must be at least 1".into()));
        }

        self.failover.roles.validate()
    }
}
