use std::collections::HashMap;
use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::bridge::{BridgeRegistry, BridgeStatus};
use crate::chain::{Chain, ChainRole, RoleAssignment, SecurityLevel};
use crate::clock::Clock;
use crate::error::Error;
use crate::health::{ChainHealthMonitor, ChainHealthStatus};
use crate::multisig::CrossChainMultiSigCoordinator;
use crate::recovery::{BlockchainError, ErrorClassifier, RecoveryStrategy};
use crate::rpc::EntityKind;
use crate::telemetry;
use crate::verification::{CrossChainVerificationResult, VerificationOptions, VerificationProtocol};
use crate::Result;

/// Tag carried by messages that need elevated review
pub const PROTOCOL_TAG: &str = "protocol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailoverStrategy {
    None,
    SwitchPrimary,
    PartialVerification,
    EmergencyProtocol,
    NoViableChain,
}

impl FailoverStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverStrategy::None => "NONE",
            FailoverStrategy::SwitchPrimary => "SWITCH_PRIMARY",
            FailoverStrategy::PartialVerification => "PARTIAL_VERIFICATION",
            FailoverStrategy::EmergencyProtocol => "EMERGENCY_PROTOCOL",
            FailoverStrategy::NoViableChain => "NO_VIABLE_CHAIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverDecision {
    pub vault_id: String,
    pub needs_failover: bool,
    pub primary_chain: Chain,
    pub primary_chain_available: bool,
    pub security_level: SecurityLevel,
    pub strategy: FailoverStrategy,
    pub fallback_chain: Option<Chain>,
    pub unavailable_chains: Vec<Chain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FailoverOptions {
    pub security_level: SecurityLevel,
    pub entity_kind: EntityKind,
}

impl Default for FailoverOptions {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Basic,
            entity_kind: EntityKind::Vault,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverOutcome {
    pub vault_id: String,
    pub strategy: FailoverStrategy,
    pub success: bool,
    pub previous_primary: Chain,
    pub new_primary: Option<Chain>,
    pub recovery_reference: Option<String>,
    pub verification: Option<CrossChainVerificationResult>,
    pub message: String,
    pub tag: Option<String>,
    pub executed_at: u64,
}

/// Why a vault is suspended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub vault_id: String,
    pub since: u64,
    pub recovery_reference: String,
    pub unavailable_chains: Vec<Chain>,
}

/// Decides and executes failover for vaults
///
/// | primary up | level | other chains | strategy |
/// |---|---|---|---|
/// | yes | BASIC | any | NONE |
/// | yes | ADVANCED, MAXIMUM | a required non-primary chain down | PARTIAL_VERIFICATION |
/// | no | MAXIMUM | 2+ required chains down | EMERGENCY_PROTOCOL |
/// | no | any | an assigned chain up | SWITCH_PRIMARY |
/// | no | any | nothing up | NO_VIABLE_CHAIN |
///
/// A chain counts as down when its health snapshot says so or when the
/// bridge from the primary to it is OFFLINE.
pub struct FailoverManager {
    monitor: Arc<ChainHealthMonitor>,
    bridges: Arc<BridgeRegistry>,
    verification: Arc<VerificationProtocol>,
    coordinator: Arc<CrossChainMultiSigCoordinator>,
    classifier: Arc<ErrorClassifier>,
    clock: Arc<dyn Clock>,
    roles: RwLock<RoleAssignment>,
    history: DashMap<String, Vec<FailoverOutcome>>,
    suspended: DashMap<String, Suspension>,
}

impl FailoverManager {
    pub fn new(
        monitor: Arc<ChainHealthMonitor>,
        bridges: Arc<BridgeRegistry>,
        verification: Arc<VerificationProtocol>,
        coordinator: Arc<CrossChainMultiSigCoordinator>,
        classifier: Arc<ErrorClassifier>,
        roles: RoleAssignment,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            monitor,
            bridges,
            verification,
            coordinator,
            classifier,
            clock,
            roles: RwLock::new(roles),
            history: DashMap::new(),
            suspended: DashMap::new(),
        }
    }

    pub fn get_primary_chain(&self) -> Chain {
        self.roles.read().primary()
    }

    pub fn get_chain_by_role(&self, role: ChainRole) -> Option<Chain> {
        self.roles.read().chain_by_role(role)
    }

    pub fn roles(&self) -> RoleAssignment {
        self.roles.read().clone()
    }

    fn chain_available(
        &self,
        health: &HashMap<Chain, ChainHealthStatus>,
        primary: Chain,
        chain: Chain,
    ) -> bool {
        let healthy = health.get(&chain).map(|h| h.is_available).unwrap_or(false);
        if !healthy {
            return false;
        }
        if chain == primary {
            return true;
        }
        !matches!(
            self.bridges.get_bridge_status(primary, chain).map(|b| b.status),
            Ok(BridgeStatus::Offline)
        )
    }

    pub async fn determine_failover_strategy(
        &self,
        vault_id: &str,
        primary_chain: Chain,
        security_level: SecurityLevel,
    ) -> Result<FailoverDecision> {
        if vault_id.trim().is_empty() {
            return Err(Error::Validation("vault id is required".into()));
        }

        let health = self.monitor.current().await;
        let roles = self.roles();
        let primary_available = self.chain_available(&health, primary_chain, primary_chain);
        let required = roles.required_chains(primary_chain, security_level);
        let unavailable: Vec<Chain> = required
            .iter()
            .copied()
            .filter(|c| !self.chain_available(&health, primary_chain, *c))
            .collect();

        let (strategy, fallback_chain) = if primary_available {
            let secondary_down = unavailable.iter().any(|c| *c != primary_chain);
            if security_level != SecurityLevel::Basic && secondary_down {
                (FailoverStrategy::PartialVerification, None)
            } else {
                (FailoverStrategy::None, None)
            }
        } else if security_level == SecurityLevel::Maximum && unavailable.len() >= 2 {
            (FailoverStrategy::EmergencyProtocol, None)
        } else {
            let fallback = roles
                .by_priority(primary_chain)
                .into_iter()
                .find(|c| self.chain_available(&health, primary_chain, *c));
            match fallback {
                Some(chain) => (FailoverStrategy::SwitchPrimary, Some(chain)),
                None => (FailoverStrategy::NoViableChain, None),
            }
        };

        let decision = FailoverDecision {
            vault_id: vault_id.to_string(),
            needs_failover: strategy != FailoverStrategy::None,
            primary_chain,
            primary_chain_available: primary_available,
            security_level,
            strategy,
            fallback_chain,
            unavailable_chains: unavailable,
        };

        if decision.needs_failover {
            warn!(
                vault_id = %vault_id,
                primary = %primary_chain,
                level = ?security_level,
                strategy = strategy.as_str(),
                fallback = ?fallback_chain,
                unavailable = ?decision.unavailable_chains,
                "failover needed"
            );
        }
        Ok(decision)
    }

    pub async fn execute_failover(
        &self,
        vault_id: &str,
        primary_chain: Chain,
        options: &FailoverOptions,
    ) -> Result<FailoverOutcome> {
        if let Some(suspension) = self.suspended.get(vault_id) {
            return Err(Error::Validation(format!(
                "vault {} is suspended under {} until an approved cross-chain request resumes it",
                vault_id, suspension.recovery_reference
            )));
        }

        let decision = self
            .determine_failover_strategy(vault_id, primary_chain, options.security_level)
            .await?;
        let now = self.clock.now_ms();
        let mut outcome = FailoverOutcome {
            vault_id: vault_id.to_string(),
            strategy: decision.strategy,
            success: true,
            previous_primary: primary_chain,
            new_primary: None,
            recovery_reference: None,
            verification: None,
            message: String::new(),
            tag: None,
            executed_at: now,
        };

        match decision.strategy {
            FailoverStrategy::None => {
                outcome.message = format!("{} healthy, no failover needed", primary_chain);
            }
            FailoverStrategy::SwitchPrimary => {
                let Some(fallback) = decision.fallback_chain else {
                    return Err(Error::Internal("switch without a fallback chain".into()));
                };
                let demoted = self.roles.write().promote(fallback);
                let reference = format!("failover-{}", uuid::Uuid::new_v4().simple());
                info!(
                    vault_id = %vault_id,
                    from = %demoted,
                    to = %fallback,
                    recovery_reference = %reference,
                    "primary chain switched"
                );
                outcome.new_primary = Some(fallback);
                outcome.recovery_reference = Some(reference);
                outcome.message = format!("primary moved from {} to {}", primary_chain, fallback);
            }
            FailoverStrategy::PartialVerification => {
                let required = self
                    .roles()
                    .required_chains(primary_chain, options.security_level);
                let mut targets: Vec<Chain> = required
                    .iter()
                    .copied()
                    .filter(|c| *c != primary_chain && !decision.unavailable_chains.contains(c))
                    .collect();
                if targets.is_empty() {
                    targets = required.into_iter().filter(|c| *c != primary_chain).collect();
                }

                let verification_options = VerificationOptions {
                    require_all_chains: false,
                    entity_kind: options.entity_kind,
                    ..VerificationOptions::default()
                };
                let result = self
                    .verification
                    .verify_across_chains(vault_id, primary_chain, &targets, &verification_options)
                    .await?;
                outcome.success = result.success;
                outcome.message = format!(
                    "verified on {} of {} reachable chains",
                    result.verified_on.len(),
                    targets.len()
                );
                outcome.verification = Some(result);
            }
            FailoverStrategy::EmergencyProtocol => {
                if options.security_level != SecurityLevel::Maximum {
                    return Err(Error::Validation(
                        "emergency protocol requires MAXIMUM security level".into(),
                    ));
                }
                let reference = format!("emergency-{}", uuid::Uuid::new_v4().simple());
                self.suspended.insert(
                    vault_id.to_string(),
                    Suspension {
                        vault_id: vault_id.to_string(),
                        since: now,
                        recovery_reference: reference.clone(),
                        unavailable_chains: decision.unavailable_chains.clone(),
                    },
                );
                warn!(
                    vault_id = %vault_id,
                    unavailable = ?decision.unavailable_chains,
                    recovery_reference = %reference,
                    "emergency protocol engaged"
                );
                outcome.recovery_reference = Some(reference);
                outcome.tag = Some(PROTOCOL_TAG.to_string());
                outcome.message = format!(
                    "{}: emergency protocol engaged for vault {}; elevated multi-signature approval required to resume",
                    PROTOCOL_TAG, vault_id
                );
            }
            FailoverStrategy::NoViableChain => {
                outcome.success = false;
                outcome.message = format!(
                    "{} unavailable and no other assigned chain is reachable",
                    primary_chain
                );
                warn!(vault_id = %vault_id, primary = %primary_chain, "no viable chain for failover");
            }
        }

        if decision.needs_failover {
            metrics::increment_counter!(
                telemetry::FAILOVERS_EXECUTED,
                "strategy" => decision.strategy.as_str()
            );
            self.history
                .entry(vault_id.to_string())
                .or_default()
                .push(outcome.clone());
        }
        Ok(outcome)
    }

    /// Executed failovers for a vault, oldest first
    pub fn failover_history(&self, vault_id: &str) -> Vec<FailoverOutcome> {
        self.history
            .get(vault_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn suspension(&self, vault_id: &str) -> Option<Suspension> {
        self.suspended.get(vault_id).map(|entry| entry.value().clone())
    }

    pub fn is_suspended(&self, vault_id: &str) -> bool {
        self.suspended.contains_key(vault_id)
    }

    /// Lift an emergency suspension with an APPROVED cross-chain approval for the vault
    pub fn resume_vault(&self, vault_id: &str, cross_chain_request_id: &str) -> Result<()> {
        if !self.suspended.contains_key(vault_id) {
            return Err(Error::Validation(format!("vault {} is not suspended", vault_id)));
        }

        let status = self
            .coordinator
            .get_cross_chain_request_status(cross_chain_request_id)?;
        if status.vault_id != vault_id {
            return Err(Error::Validation(format!(
                "cross-chain request {} belongs to vault {}",
                cross_chain_request_id, status.vault_id
            )));
        }
        if !status.is_fully_approved() {
            return Err(Error::Validation(format!(
                "cross-chain request {} is {:?}, approval required",
                cross_chain_request_id, status.status
            )));
        }

        self.suspended.remove(vault_id);
        info!(vault_id = %vault_id, cross_chain_request_id = %cross_chain_request_id, "vault resumed");
        Ok(())
    }

    /// Route a classified error whose recovery is FALLBACK_CHAIN into failover
    ///
    /// Returns `None` when the error calls for a different recovery.
    pub async fn handle_cross_chain_error(
        &self,
        vault_id: &str,
        primary_chain: Chain,
        error: &BlockchainError,
        options: &FailoverOptions,
    ) -> Result<Option<FailoverOutcome>> {
        if self.classifier.recovery_strategy(error) != RecoveryStrategy::FallbackChain {
            return Ok(None);
        }

        if let Some(chain) = error.blockchain().filter(|c| *c != primary_chain) {
            self.bridges.record_error(primary_chain, chain, error.message());
        }
        info!(
            vault_id = %vault_id,
            correlation_id = %error.correlation_id(),
            "cross-chain error handed to failover"
        );
        self.execute_failover(vault_id, primary_chain, options).await.map(Some)
    }
}
