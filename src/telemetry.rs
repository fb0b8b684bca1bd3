//! Tracing setup and metric names

use tracing_subscriber::EnvFilter;

pub const ERRORS_CLASSIFIED: &str = "crossvault_errors_classified_total";
pub const BRIDGE_STATUS_CHANGES: &str = "crossvault_bridge_status_changes_total";
pub const TRANSFERS_SUBMITTED: &str = "crossvault_transfers_submitted_total";
pub const TRANSFER_VERIFICATIONS: &str = "crossvault_transfer_verifications_total";
pub const VERIFICATIONS: &str = "crossvault_chain_verifications_total";
pub const VERIFICATION_DURATION: &str = "crossvault_verification_duration_seconds";
pub const HEALTH_PROBES: &str = "crossvault_health_probes_total";
pub const SIGNATURES_TALLIED: &str = "crossvault_signatures_tallied_total";
pub const APPROVAL_TRANSITIONS: &str = "crossvault_approval_transitions_total";
pub const PROOFS_AGGREGATED: &str = "crossvault_proofs_aggregated_total";
pub const FAILOVERS_EXECUTED: &str = "crossvault_failovers_executed_total";

/// Install a fmt subscriber filtered by `filter`, or by `RUST_LOG` when set
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
