use std::time::Duration;
use pretty_assertions::assert_eq;

use crossvault_protocol::bridge::BridgeStatus;
use crossvault_protocol::chain::Chain;
use crossvault_protocol::health::ChainHealthMonitor;
use crossvault_protocol::rpc::ChainClientError;

use crate::common::{fake_clients, fast_config, manual_clock, Harness, T0};

#[tokio::test]
async fn chains_start_unavailable_until_probed() {
    let harness = Harness::new();
    let monitor = harness.service.monitor();

    for chain in Chain::ALL {
        assert!(!monitor.is_available(chain));
        assert!(monitor.is_stale(chain));
        assert_eq!(monitor.status_of(chain).unwrap().checked_at, 0);
    }
}

#[test_log::test(tokio::test)]
async fn probe_records_availability_and_latency() {
    let harness = Harness::new();
    harness.fake(Chain::Sol).set_reported_latency(Some(3_500));
    harness.fake(Chain::Btc).set_available(false);

    let snapshot = harness.service.monitor().check_all_chains_health().await;

    assert_eq!(snapshot.len(), 5);
    let eth = &snapshot[&Chain::Eth];
    assert!(eth.is_available);
    assert_eq!(eth.latency_ms, 50);
    assert_eq!(eth.latest_block, Some(1_000));
    assert_eq!(eth.last_sync_timestamp, Some(T0));
    assert_eq!(eth.checked_at, T0);

    assert_eq!(snapshot[&Chain::Sol].latency_ms, 3_500);

    let btc = &snapshot[&Chain::Btc];
    assert!(!btc.is_available);
    assert!(btc.error.as_deref().unwrap_or_default().contains("unreachable"));
    assert_eq!(btc.last_sync_timestamp, None);
}

#[tokio::test]
async fn slow_probe_counts_as_unavailable() {
    let harness = Harness::new();
    harness.fake(Chain::Ton).set_delay(Duration::from_millis(500));

    let snapshot = harness.service.monitor().check_all_chains_health().await;

    let ton = &snapshot[&Chain::Ton];
    assert!(!ton.is_available);
    assert!(ton.error.as_deref().unwrap_or_default().contains("exceeded"));
    assert!(snapshot[&Chain::Eth].is_available);
}

#[tokio::test]
async fn failed_probe_keeps_last_sync_time() {
    let harness = Harness::new();
    let monitor = harness.service.monitor();
    monitor.check_all_chains_health().await;

    harness.clock.advance(10_000);
    harness.fake(Chain::Eth).fail_next(ChainClientError::Network("reset".into()));
    let snapshot = monitor.check_all_chains_health().await;

    let eth = &snapshot[&Chain::Eth];
    assert!(!eth.is_available);
    assert_eq!(eth.last_sync_timestamp, Some(T0));
    assert_eq!(eth.checked_at, T0 + 10_000);
}

#[tokio::test]
async fn current_refreshes_only_stale_snapshots() {
    let (clock, dyn_clock) = manual_clock();
    let (clients, fakes) = fake_clients();
    let monitor = ChainHealthMonitor::new(clients, dyn_clock, fast_config().health);

    monitor.current().await;
    let probes = fakes[&Chain::Eth].call_count();
    assert_eq!(probes, 1);

    clock.advance(1_000);
    monitor.current().await;
    assert_eq!(fakes[&Chain::Eth].call_count(), 1);

    clock.advance(30_001);
    assert!(monitor.is_stale(Chain::Eth));
    monitor.current().await;
    assert_eq!(fakes[&Chain::Eth].call_count(), 2);
}

#[tokio::test]
async fn poller_feeds_bridge_registry() {
    let harness = Harness::new();
    harness
        .service
        .bridges()
        .initialize_bridge(Chain::Eth, Chain::Sol)
        .unwrap();
    harness.fake(Chain::Sol).set_available(false);

    let poller = harness.service.spawn_health_poller();
    let mut status = BridgeStatus::Online;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = harness
            .service
            .bridges()
            .get_bridge_status(Chain::Eth, Chain::Sol)
            .unwrap()
            .status;
        if status == BridgeStatus::Offline {
            break;
        }
    }
    poller.stop().await;

    assert_eq!(status, BridgeStatus::Offline);
    assert!(harness.service.monitor().status_of(Chain::Eth).unwrap().is_available);
}
