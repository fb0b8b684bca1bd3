use std::time::Duration;
use pretty_assertions::assert_eq;

use crossvault_protocol::chain::{Chain, ChainRole};
use crossvault_protocol::config::ProtocolConfig;
use crossvault_protocol::Error;

#[test]
fn defaults_are_valid() {
    let config = ProtocolConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.health.poll_interval, Duration::from_secs(30));
    assert_eq!(config.health.degraded_latency_ms, 2_000);
    assert_eq!(config.bridge.degraded_eta_multiplier, 3);
    assert_eq!(config.multisig.source_threshold, 2);
    assert_eq!(config.multisig.secondary_threshold, 1);
    assert_eq!(config.multisig.default_expiration, Duration::from_secs(86_400));
}

#[test]
fn chain_tables_cover_every_chain() {
    let chains = ProtocolConfig::default().chains;
    assert_eq!(chains.confirmations_for(Chain::Sol), 32);
    assert_eq!(chains.fee_for(Chain::Btc), "0.0001");
    assert_eq!(chains.fee_for(Chain::Ton), "0.1");
    assert_eq!(chains.interval_for(Chain::Sol), Duration::from_millis(400));
    for chain in Chain::ALL {
        assert!(!chains.contract_for(chain).is_empty());
    }
}

#[test]
fn partial_json_keeps_other_defaults() {
    let json = r#"{
        "health": { "degraded_latency_ms": 500 },
        "multisig": { "source_threshold": 3 }
    }"#;
    let config = ProtocolConfig::from_json_str(json).unwrap();
    assert_eq!(config.health.degraded_latency_ms, 500);
    assert_eq!(config.health.poll_interval, Duration::from_secs(30));
    assert_eq!(config.multisig.source_threshold, 3);
    assert_eq!(config.multisig.secondary_threshold, 1);
    assert_eq!(config.chains.confirmations_for(Chain::Eth), 12);
}

#[test]
fn confirmation_override_from_json() {
    let json = r#"{ "chains": { "confirmations_required": { "BTC": 3 } } }"#;
    let config = ProtocolConfig::from_json_str(json).unwrap();
    assert_eq!(config.chains.confirmations_for(Chain::Btc), 3);
    // chains missing from an overridden table fall back to the built-in value
    assert_eq!(config.chains.confirmations_for(Chain::Eth), 12);
}

#[test]
fn malformed_json_is_a_config_error() {
    let err = ProtocolConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn unknown_chain_in_json_is_rejected() {
    let json = r#"{ "chains": { "confirmations_required": { "DOGE": 3 } } }"#;
    assert!(ProtocolConfig::from_json_str(json).is_err());
}

#[test]
fn validate_rejects_broken_settings() {
    let mut config = ProtocolConfig::default();
    config.chains.confirmations_required.insert(Chain::Eth, 0);
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = ProtocolConfig::default();
    config.verification.window = 0;
    assert!(config.validate().is_err());

    let mut config = ProtocolConfig::default();
    config.retry.jitter_factor = 1.5;
    assert!(config.validate().is_err());

    let mut config = ProtocolConfig::default();
    config.multisig.supported_chains = vec![Chain::Eth];
    assert!(config.validate().is_err());
}

#[test]
fn role_table_is_validated() {
    let json = r#"{ "failover": { "roles": { "roles": { "ETH": "SECONDARY", "SOL": "SECONDARY" } } } }"#;
    let err = ProtocolConfig::from_json_str(json).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let json = r#"{ "failover": { "roles": { "roles": { "SOL": "PRIMARY", "ETH": "FALLBACK" } } } }"#;
    let config = ProtocolConfig::from_json_str(json).unwrap();
    assert_eq!(config.failover.roles.primary(), Chain::Sol);
    assert_eq!(config.failover.roles.role_of(Chain::Eth), Some(ChainRole::Fallback));
}

#[test]
fn missing_file_is_io_error() {
    let err = ProtocolConfig::from_file("/definitely/not/here/crossvault.json").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn loads_from_file() {
    let path = std::env::temp_dir().join(format!("crossvault-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "verification": { "window": 5 } }"#).unwrap();
    let config = ProtocolConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(config.verification.window, 5);
}
