use std::time::Duration;
use pretty_assertions::assert_eq;

use crossvault_protocol::bridge::{
    AssetTransferRequest,
    BridgeStatus,
    MessageRelayRequest,
    TransferStatus,
};
use crossvault_protocol::chain::Chain;
use crossvault_protocol::Error;
use crate::common::Harness;

fn asset(source: Chain, target: Chain) -> AssetTransferRequest {
    AssetTransferRequest {
        source_chain: source,
        target_chain: target,
        amount: "12.5".into(),
        asset_type: "USDC".into(),
        sender_address: "0xsender".into(),
        recipient_address: "recipient".into(),
        timestamp: None,
    }
}

#[test_log::test(tokio::test)]
async fn bridge_follows_chain_health() {
    let harness = Harness::new();
    let bridges = harness.service.bridges();
    let transfers = harness.service.transfers();
    bridges.initialize_bridge(Chain::Eth, Chain::Ton).unwrap();
    harness.poll_health().await;
    assert_eq!(bridges.get_bridge_status(Chain::Eth, Chain::Ton).unwrap().status, BridgeStatus::Online);

    let healthy = transfers.transfer_asset(&asset(Chain::Eth, Chain::Ton)).unwrap();
    assert_eq!(healthy.status, TransferStatus::Pending);

    // Slow node degrades the bridge and stretches the ETA
    harness.fake(Chain::Ton).set_reported_latency(Some(4_000));
    harness.clock.advance(30_001);
    harness.poll_health().await;
    let degraded = bridges.get_bridge_status(Chain::Eth, Chain::Ton).unwrap();
    assert_eq!(degraded.status, BridgeStatus::Degraded);
    let slow = transfers.transfer_asset(&asset(Chain::Eth, Chain::Ton)).unwrap();
    assert_eq!(slow.status, TransferStatus::PendingSlow);
    assert!(slow.estimated_completion_time - 30_001 > healthy.estimated_completion_time);

    // Unreachable node takes it offline
    harness.set_down(&[Chain::Ton]);
    harness.poll_health().await;
    let offline = bridges.get_bridge_status(Chain::Eth, Chain::Ton).unwrap();
    assert_eq!(offline.status, BridgeStatus::Offline);
    assert!(offline.last_error.unwrap().contains("TON"));
    assert!(matches!(
        transfers.transfer_asset(&asset(Chain::Eth, Chain::Ton)),
        Err(Error::BridgeOffline { .. })
    ));

    // Recovery brings it back
    harness.fake(Chain::Ton).set_available(true);
    harness.fake(Chain::Ton).set_reported_latency(Some(50));
    harness.poll_health().await;
    assert_eq!(bridges.get_bridge_status(Chain::Eth, Chain::Ton).unwrap().status, BridgeStatus::Online);
}

#[tokio::test]
async fn transfer_settles_once_confirmations_arrive() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Sol, Chain::Btc).unwrap();
    let transfers = harness.service.transfers();

    let receipt = transfers.transfer_asset(&asset(Chain::Sol, Chain::Btc)).unwrap();
    let id = receipt.transaction_id;

    let mut last = 0;
    let mut polls = 0;
    loop {
        polls += 1;
        assert!(polls <= 5, "transfer never settled");
        let result = transfers.verify_transaction(&id, Chain::Sol, Chain::Btc).await.unwrap();
        assert!(result.confirmations >= last);
        last = result.confirmations;
        if result.verified {
            assert_eq!(result.completion_percentage, 100);
            assert_eq!(result.estimated_time_remaining, None);
            break;
        }
    }
    assert_eq!(polls, 3);

    let tracked = transfers.get_transfer(&id).unwrap();
    assert_eq!(tracked.status, TransferStatus::Settled);
    assert!(tracked.confirmations >= 6);
}

#[tokio::test]
async fn message_relay_shares_the_bridge() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Polygon, Chain::Eth).unwrap();

    let relay = MessageRelayRequest {
        source_chain: Chain::Polygon,
        target_chain: Chain::Eth,
        sender_address: "0xa".into(),
        recipient_address: "0xb".into(),
        payload: serde_json::json!({ "op": "sync" }),
        proof: Some("0xproof".into()),
        timestamp: None,
    };
    let receipt = harness.service.transfers().relay_message(&relay).unwrap();
    assert_eq!(receipt.status, TransferStatus::Pending);

    let reverse = MessageRelayRequest {
        source_chain: Chain::Eth,
        target_chain: Chain::Polygon,
        ..relay
    };
    assert!(matches!(
        harness.service.transfers().relay_message(&reverse),
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn background_poller_updates_bridges() {
    let harness = Harness::new();
    harness.service.bridges().initialize_bridge(Chain::Eth, Chain::Sol).unwrap();
    harness.set_down(&[Chain::Sol]);

    let poller = harness.service.spawn_health_poller();
    let mut status = BridgeStatus::Online;
    for _ in 0..50 {
        status = harness.service.bridges().get_bridge_status(Chain::Eth, Chain::Sol).unwrap().status;
        if status == BridgeStatus::Offline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poller.stop().await;

    assert_eq!(status, BridgeStatus::Offline);
}
