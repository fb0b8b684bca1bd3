use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use pretty_assertions::assert_eq;

use crossvault_protocol::chain::Chain;
use crossvault_protocol::clock::ManualClock;
use crossvault_protocol::recovery::{ErrorCategory, ErrorClassifier};
use crossvault_protocol::rpc::{
    run_windowed,
    with_retry,
    ChainClient,
    ChainClientError,
    DefaultRetryPolicy,
    FakeChainClient,
    RetryConfig,
    RetryPolicy,
};

use crate::common::T0;

fn fast_policy(max_attempts: u32) -> DefaultRetryPolicy {
    DefaultRetryPolicy::new(RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_factor: 2.0,
        jitter_factor: 0.0,
    })
}

fn classifier() -> ErrorClassifier {
    ErrorClassifier::with_clock(Arc::new(ManualClock::new(T0)))
}

#[test]
fn backoff_grows_and_caps() {
    let policy = DefaultRetryPolicy::new(RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(300),
        backoff_factor: 2.0,
        jitter_factor: 0.0,
    });
    assert_eq!(policy.get_delay(1), Duration::from_millis(100));
    assert_eq!(policy.get_delay(2), Duration::from_millis(200));
    assert_eq!(policy.get_delay(3), Duration::from_millis(300));
    assert_eq!(policy.get_delay(10), Duration::from_millis(300));
}

#[test]
fn jitter_stays_within_bounds() {
    let policy = DefaultRetryPolicy::new(RetryConfig {
        jitter_factor: 0.2,
        initial_delay: Duration::from_millis(100),
        ..RetryConfig::default()
    });
    for _ in 0..50 {
        let delay = policy.get_delay(1);
        assert!(delay >= Duration::from_millis(80) && delay <= Duration::from_millis(120), "{:?}", delay);
    }
}

#[test_log::test(tokio::test)]
async fn transient_failure_is_retried() {
    let client = FakeChainClient::new(Chain::Eth);
    client.fail_next(ChainClientError::Network("connection reset".into()));
    let policy = fast_policy(3);

    let report = with_retry(Chain::Eth, Duration::from_secs(1), &policy, &classifier(), || client.get_health())
        .await
        .unwrap();

    assert_eq!(report.latest_block, 1_000);
    assert_eq!(client.call_count(), 2);
    let metrics = policy.metrics();
    assert_eq!(metrics.total_calls, 1);
    assert_eq!(metrics.total_retries, 1);
    assert_eq!(metrics.successful_retries, 1);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let client = FakeChainClient::new(Chain::Sol);
    client.fail_next(ChainClientError::InvalidInput("bad id".into()));
    let policy = fast_policy(3);

    let err = with_retry(Chain::Sol, Duration::from_secs(1), &policy, &classifier(), || client.get_confirmations("tx"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(client.call_count(), 1);
    assert_eq!(policy.metrics().failed_retries, 0);
}

#[tokio::test]
async fn attempts_are_bounded() {
    let client = FakeChainClient::new(Chain::Ton);
    client.set_available(false);
    let policy = fast_policy(3);

    let err = with_retry(Chain::Ton, Duration::from_secs(1), &policy, &classifier(), || client.get_health())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Network);
    assert_eq!(err.blockchain(), Some(Chain::Ton));
    assert_eq!(client.call_count(), 3);
    assert_eq!(err.context().get("attempt").map(String::as_str), Some("3"));
    assert_eq!(policy.metrics().failed_retries, 1);
}

#[tokio::test]
async fn slow_call_times_out_per_attempt() {
    let client = FakeChainClient::new(Chain::Btc);
    client.set_delay(Duration::from_millis(200));
    let policy = fast_policy(1);

    let err = with_retry(Chain::Btc, Duration::from_millis(20), &policy, &classifier(), || client.get_health())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("TIMEOUT"));
    assert!(err.retryable());
}

#[tokio::test]
async fn windowed_run_preserves_order() {
    let out = run_windowed(vec![5u64, 1, 3, 2, 4], 2, |n| async move {
        tokio::time::sleep(Duration::from_millis(n)).await;
        n * 10
    })
    .await;
    assert_eq!(out, vec![50, 10, 30, 20, 40]);
}

#[tokio::test]
async fn windowed_run_bounds_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let out = run_windowed(0..7, 3, |i| {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            i
        }
    })
    .await;

    assert_eq!(out, (0..7).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn zero_window_still_makes_progress() {
    let out = run_windowed(vec!['a', 'b'], 0, |c| async move { c }).await;
    assert_eq!(out, vec!['a', 'b']);
}
