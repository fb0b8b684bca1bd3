use std::collections::HashMap;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crossvault_protocol::bridge::{
    completion_percentage,
    evaluate_status,
    AssetTransferRequest,
    BridgeStatus,
    MessageRelayRequest,
    TransferKind,
    TransferStatus,
};
use crossvault_protocol::chain::Chain;
use crossvault_protocol::health::ChainHealthStatus;
use crossvault_protocol::rpc::ChainClientError;
use crossvault_protocol::Error;

use crate::common::{Harness, T0};

fn health(chain: Chain, available: bool, latency_ms: u64) -> ChainHealthStatus {
    ChainHealthStatus {
        chain,
        is_available: available,
        latency_ms,
        last_sync_timestamp: available.then_some(T0),
        latest_block: available.then_some(1_000),
        checked_at: T0,
        error: None,
    }
}

fn snapshot(entries: &[(Chain, bool, u64)]) -> HashMap<Chain, ChainHealthStatus> {
    entries
        .iter()
        .map(|(chain, available, latency)| (*chain, health(*chain, *available, *latency)))
        .collect()
}

fn transfer(source: Chain, target: Chain) -> AssetTransferRequest {
    AssetTransferRequest {
        source_chain: source,
        target_chain: target,
        amount: "1.5".into(),
        asset_type: "USDC".into(),
        sender_address: "0xsender".into(),
        recipient_address: "recipient".into(),
        timestamp: None,
    }
}

#[test]
fn status_follows_endpoint_health() {
    let up = health(Chain::Eth, true, 100);
    let slow = health(Chain::Sol, true, 2_500);
    let down = health(Chain::Sol, false, 0);

    assert_eq!(evaluate_status(Some(&up), Some(&up), 2_000), BridgeStatus::Online);
    assert_eq!(evaluate_status(Some(&up), Some(&slow), 2_000), BridgeStatus::Degraded);
    assert_eq!(evaluate_status(Some(&up), Some(&down), 2_000), BridgeStatus::Offline);
    assert_eq!(evaluate_status(Some(&up), None, 2_000), BridgeStatus::Offline);
    // exactly at the threshold is still online
    let edge = health(Chain::Sol, true, 2_000);
    assert_eq!(evaluate_status(Some(&up), Some(&edge), 2_000), BridgeStatus::Online);
}

#[test]
fn initialize_creates_online_bridge_with_target_confirmations() {
    let harness = Harness::new();
    let bridge = harness.service.bridges().initialize_bridge(Chain::Eth, Chain::Sol).unwrap();

    assert_eq!(bridge.status, BridgeStatus::Online);
    assert_eq!(bridge.confirmations_required, 32);
    assert_eq!(bridge.updated_at, T0);
    assert!(bridge.last_error.is_none());
    assert!(!bridge.contract_refs.session_id.is_empty());
    assert_ne!(bridge.contract_refs.source_contract, bridge.contract_refs.target_contract);
}

#[test]
fn bridge_to_same_chain_is_rejected() {
    let harness = Harness::new();
    let err = harness.service.bridges().initialize_bridge(Chain::Btc, Chain::Btc).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn bridges_are_directional() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    bridges.initialize_bridge(Chain::Eth, Chain::Btc).unwrap();

    assert!(matches!(bridges.get_bridge_status(Chain::Btc, Chain::Eth), Err(Error::NotFound(_))));
    let reverse = bridges.initialize_bridge(Chain::Btc, Chain::Eth).unwrap();
    assert_eq!(reverse.confirmations_required, 12);
    assert_eq!(bridges.get_bridge_statuses().len(), 2);
}

#[test]
fn reinitialize_resets_to_online_with_fresh_session() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    let first = bridges.initialize_bridge(Chain::Eth, Chain::Sol).unwrap();

    bridges.reevaluate(&snapshot(&[(Chain::Eth, true, 10), (Chain::Sol, false, 0)]));
    assert_eq!(bridges.get_bridge_status(Chain::Eth, Chain::Sol).unwrap().status, BridgeStatus::Offline);

    let second = bridges.initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    assert_eq!(second.status, BridgeStatus::Online);
    assert!(second.last_error.is_none());
    assert_ne!(first.contract_refs.session_id, second.contract_refs.session_id);
    assert_eq!(bridges.get_bridge_statuses().len(), 1);
}

#[test]
fn reevaluate_reports_changes_and_records_reason() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    bridges.initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    bridges.initialize_bridge(Chain::Eth, Chain::Ton).unwrap();

    let changed = bridges.reevaluate(&snapshot(&[
        (Chain::Eth, true, 10),
        (Chain::Sol, true, 5_000),
        (Chain::Ton, false, 0),
    ]));
    assert_eq!(changed, 2);

    let sol = bridges.get_bridge_status(Chain::Eth, Chain::Sol).unwrap();
    assert_eq!(sol.status, BridgeStatus::Degraded);
    assert!(sol.last_error.unwrap().contains("latency"));
    assert_eq!(sol.latest_sync_block, Some(1_000));

    let ton = bridges.get_bridge_status(Chain::Eth, Chain::Ton).unwrap();
    assert_eq!(ton.status, BridgeStatus::Offline);
    assert!(ton.last_error.unwrap().contains("TON"));

    let unchanged = bridges.reevaluate(&snapshot(&[
        (Chain::Eth, true, 10),
        (Chain::Sol, true, 5_000),
        (Chain::Ton, false, 0),
    ]));
    assert_eq!(unchanged, 0);
}

#[test]
fn recorded_error_does_not_demote_bridge() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    bridges.initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    bridges.record_error(Chain::Eth, Chain::Sol, "relay stuck");

    let bridge = bridges.get_bridge_status(Chain::Eth, Chain::Sol).unwrap();
    assert_eq!(bridge.status, BridgeStatus::Online);
    assert_eq!(bridge.last_error.as_deref(), Some("relay stuck"));
}

#[test]
fn transfer_over_online_bridge_is_pending() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Eth, Chain::Sol).unwrap();

    let receipt = harness.service.transfers().transfer_asset(&transfer(Chain::Eth, Chain::Sol)).unwrap();

    assert_eq!(receipt.status, TransferStatus::Pending);
    assert_eq!(receipt.fee, "0.001");
    assert_eq!(receipt.estimated_completion_time, T0 + 32 * 400);
    assert!(receipt.transaction_id.starts_with("tx-"));

    let tracked = harness.service.transfers().get_transfer(&receipt.transaction_id).unwrap();
    assert_eq!(tracked.kind, TransferKind::Asset);
    assert_eq!(tracked.confirmations, 0);
}

#[test]
fn transfer_over_degraded_bridge_is_slow() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    bridges.initialize_bridge(Chain::Btc, Chain::Eth).unwrap();
    bridges.reevaluate(&snapshot(&[(Chain::Btc, true, 9_000), (Chain::Eth, true, 10)]));

    let receipt = harness.service.transfers().transfer_asset(&transfer(Chain::Btc, Chain::Eth)).unwrap();

    assert_eq!(receipt.status, TransferStatus::PendingSlow);
    assert_eq!(receipt.fee, "0.0001");
    assert_eq!(receipt.estimated_completion_time, T0 + 12 * 12_000 * 3);
}

#[test]
fn transfer_over_offline_bridge_is_refused() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    bridges.initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    bridges.reevaluate(&snapshot(&[(Chain::Eth, false, 0), (Chain::Sol, true, 10)]));

    let err = harness.service.transfers().transfer_asset(&transfer(Chain::Eth, Chain::Sol)).unwrap_err();
    assert!(matches!(err, Error::BridgeOffline { source_chain: Chain::Eth, target_chain: Chain::Sol }));
    assert_eq!(err.status_code(), 503);
}

#[test]
fn transfer_without_bridge_is_not_found() {
    let harness = Harness::new();
    let err = harness.service.transfers().transfer_asset(&transfer(Chain::Ton, Chain::Polygon)).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn transfer_amount_must_be_positive() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    let transfers = harness.service.transfers();

    for amount in ["0", "-3", "abc", "NaN", ""] {
        let mut request = transfer(Chain::Eth, Chain::Sol);
        request.amount = amount.into();
        assert!(matches!(transfers.transfer_asset(&request), Err(Error::Validation(_))), "{}", amount);
    }
}

#[test]
fn relay_requires_a_proof() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Sol, Chain::Ton).unwrap();
    let mut request = MessageRelayRequest {
        source_chain: Chain::Sol,
        target_chain: Chain::Ton,
        payload: serde_json::json!({ "op": "sync" }),
        sender_address: "sender".into(),
        recipient_address: "recipient".into(),
        proof: None,
        timestamp: None,
    };

    let err = harness.service.transfers().relay_message(&request).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    request.proof = Some("0xproof".into());
    let receipt = harness.service.transfers().relay_message(&request).unwrap();
    let tracked = harness.service.transfers().get_transfer(&receipt.transaction_id).unwrap();
    assert_eq!(tracked.kind, TransferKind::Message);
    assert_eq!(receipt.fee, "0.01");
}

#[tokio::test]
async fn confirmations_are_monotonic_and_settle() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Sol, Chain::Btc).unwrap();
    let receipt = harness.service.transfers().transfer_asset(&transfer(Chain::Sol, Chain::Btc)).unwrap();
    let id = receipt.transaction_id;
    let transfers = harness.service.transfers();

    // fake reports 0, 4, 8 ... for successive polls
    let first = transfers.verify_transaction(&id, Chain::Sol, Chain::Btc).await.unwrap();
    assert_eq!(first.confirmations, 0);
    assert!(!first.verified);
    assert_eq!(first.required_confirmations, 6);
    assert_eq!(first.completion_percentage, 0);
    assert_eq!(first.estimated_time_remaining, Some(6 * 600_000));

    let second = transfers.verify_transaction(&id, Chain::Sol, Chain::Btc).await.unwrap();
    assert_eq!(second.confirmations, 4);
    assert_eq!(second.completion_percentage, 67);

    harness.fake(Chain::Btc).set_confirmations(&id, 1);
    let third = transfers.verify_transaction(&id, Chain::Sol, Chain::Btc).await.unwrap();
    assert_eq!(third.confirmations, 4);

    harness.fake(Chain::Btc).set_confirmations(&id, 9);
    let fourth = transfers.verify_transaction(&id, Chain::Sol, Chain::Btc).await.unwrap();
    assert!(fourth.verified);
    assert_eq!(fourth.completion_percentage, 100);
    assert_eq!(fourth.estimated_time_remaining, None);
    assert_eq!(transfers.get_transfer(&id).unwrap().status, TransferStatus::Settled);
}

#[tokio::test]
async fn settled_transfers_are_pruned_after_retention() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Sol, Chain::Btc).unwrap();
    let transfers = harness.service.transfers();
    let settled = transfers.transfer_asset(&transfer(Chain::Sol, Chain::Btc)).unwrap().transaction_id;
    let open = transfers.transfer_asset(&transfer(Chain::Sol, Chain::Btc)).unwrap().transaction_id;

    harness.fake(Chain::Btc).set_confirmations(&settled, 6);
    transfers.verify_transaction(&settled, Chain::Sol, Chain::Btc).await.unwrap();
    assert_eq!(transfers.get_transfer(&settled).unwrap().settled_at, Some(T0));
    assert_eq!(transfers.prune_settled_transfers(), 0);

    harness.clock.advance(24 * 60 * 60 * 1000 + 1);
    assert_eq!(transfers.prune_settled_transfers(), 1);
    assert!(matches!(transfers.get_transfer(&settled), Err(Error::NotFound(_))));
    assert_eq!(transfers.get_transfer(&open).unwrap().status, TransferStatus::Pending);
}

#[tokio::test]
async fn verification_rejects_wrong_pair() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    let receipt = harness.service.transfers().transfer_asset(&transfer(Chain::Eth, Chain::Sol)).unwrap();

    let err = harness
        .service
        .transfers()
        .verify_transaction(&receipt.transaction_id, Chain::Eth, Chain::Ton)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn untracked_transaction_uses_confirmation_table() {
    let harness = Harness::new();
    harness.fake(Chain::Polygon).set_confirmations("external-tx", 25);

    let result = harness
        .service
        .transfers()
        .verify_transaction("external-tx", Chain::Eth, Chain::Polygon)
        .await
        .unwrap();
    assert_eq!(result.required_confirmations, 20);
    assert!(result.verified);
}

#[tokio::test]
async fn chain_failure_surfaces_classified_error() {
    let harness = Harness::new();
    harness.fake(Chain::Sol).fail_next(ChainClientError::Contract("reverted".into()));

    let err = harness
        .service
        .transfers()
        .verify_transaction("tx-1", Chain::Eth, Chain::Sol)
        .await
        .unwrap_err();
    match err {
        Error::Chain(e) => assert_eq!(e.blockchain(), Some(Chain::Sol)),
        other => panic!("unexpected error: {}", other),
    }
}

proptest! {
    #[test]
    fn completion_is_bounded_and_monotonic(required in 1u32..200, a in 0u32..400, b in 0u32..400) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let p_low = completion_percentage(low, required);
        let p_high = completion_percentage(high, required);
        prop_assert!(p_high <= 100);
        prop_assert!(p_low <= p_high);
        if high >= required {
            prop_assert_eq!(p_high, 100);
        }
    }

    #[test]
    fn completion_rounds_half_up(required in 1u32..200, confirmations in 0u32..200) {
        let exact = 100.0 * confirmations as f64 / required as f64;
        let expected = (exact + 0.5).floor().min(100.0) as u8;
        prop_assert_eq!(completion_percentage(confirmations, required), expected);
    }

    #[test]
    fn parsed_chain_ids_round_trip(chain in prop::sample::select(Chain::ALL.to_vec())) {
        let parsed: Chain = chain.as_str().to_lowercase().parse().unwrap();
        prop_assert_eq!(parsed, chain);
    }
}
