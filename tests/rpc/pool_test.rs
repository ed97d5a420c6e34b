use std::sync::Arc;
use std::time::Duration;

use universal_client::services::rpc::{
    EndpointState, LoadBalancingStrategy, PoolError, RpcPool,
};

use crate::common::{init_tracing, pool_config, MockChainClient, MockFactory};

// =============================================================================
// INTEGRATION TESTS - RPC POOL
// =============================================================================

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

async fn started_pool(
    endpoint_urls: &[&str],
    strategy: LoadBalancingStrategy,
) -> Arc<RpcPool<MockChainClient>> {
    init_tracing();
    let pool = RpcPool::new(
        "eip155:11155111",
        &urls(endpoint_urls),
        pool_config(strategy),
        Arc::new(MockFactory::new()),
        None,
    );
    pool.start().await.expect("pool should start");
    pool
}

// =============================================================================
// STARTUP
// =============================================================================

#[tokio::test]
async fn test_start_attaches_clients() {
    let pool = started_pool(
        &["https://a.example.com", "https://b.example.com"],
        LoadBalancingStrategy::RoundRobin,
    )
    .await;

    for ep in pool.endpoints() {
        assert!(ep.client().is_some(), "client missing for {}", ep.url());
        assert_eq!(ep.state(), EndpointState::Healthy);
    }
    pool.stop().await;
}

#[tokio::test]
async fn test_factory_failure_marks_endpoint_unhealthy() {
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://good.example.com", "https://bad.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::failing(&["https://bad.example.com"])),
        None,
    );
    pool.start().await.expect("one healthy endpoint is enough");

    let status = pool.health_status();
    let bad = status
        .iter()
        .find(|s| s.url == "https://bad.example.com")
        .unwrap();
    assert_eq!(bad.state, EndpointState::Unhealthy);

    // Selection only ever lands on the surviving endpoint
    for _ in 0..5 {
        let ep = pool.select_endpoint().unwrap();
        assert_eq!(ep.url(), "https://good.example.com");
    }
    pool.stop().await;
}

#[tokio::test]
async fn test_start_fails_below_minimum_healthy() {
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://bad.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::failing(&["https://bad.example.com"])),
        None,
    );
    let err = pool.start().await.unwrap_err();
    match err {
        PoolError::InsufficientHealthyEndpoints { healthy, minimum } => {
            assert_eq!(healthy, 0);
            assert_eq!(minimum, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// SELECTION
// =============================================================================

#[tokio::test]
async fn test_selection_stamps_last_used() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;

    let ep = pool.select_endpoint().unwrap();
    assert!(ep.last_used().is_some(), "selection must stamp last_used");
    pool.stop().await;
}

#[tokio::test]
async fn test_no_healthy_endpoints_error() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;

    pool.force_exclude_endpoint("https://a.example.com").unwrap();
    let err = pool.select_endpoint().unwrap_err();
    assert_eq!(err.to_string(), "no healthy endpoints available");
    pool.stop().await;
}

// =============================================================================
// PASSIVE STATE MACHINE
// =============================================================================

#[tokio::test]
async fn test_threshold_failures_exclude_endpoint() {
    let pool = started_pool(
        &["https://a.example.com", "https://b.example.com"],
        LoadBalancingStrategy::RoundRobin,
    )
    .await;
    let a = pool.endpoints()[0].clone();

    // One failure short of the threshold: not excluded yet
    for _ in 0..2 {
        pool.update_endpoint_metrics(&a, false, Duration::from_secs(1), Some("timeout"));
    }
    assert_ne!(a.state(), EndpointState::Excluded);

    pool.update_endpoint_metrics(&a, false, Duration::from_secs(1), Some("timeout"));
    assert_eq!(a.state(), EndpointState::Excluded);
    assert!(a.excluded_at().is_some());

    // Every subsequent selection lands on B, regardless of strategy
    for _ in 0..5 {
        assert_eq!(pool.select_endpoint().unwrap().url(), "https://b.example.com");
    }
    pool.stop().await;
}

#[tokio::test]
async fn test_excluded_endpoint_invisible_to_weighted_selection() {
    let pool = started_pool(
        &["https://a.example.com", "https://b.example.com"],
        LoadBalancingStrategy::Weighted,
    )
    .await;
    let a = pool.endpoints()[0].clone();

    for _ in 0..3 {
        pool.update_endpoint_metrics(&a, false, Duration::from_secs(1), Some("down"));
    }
    assert_eq!(a.state(), EndpointState::Excluded);

    for _ in 0..20 {
        assert_eq!(pool.select_endpoint().unwrap().url(), "https://b.example.com");
    }
    pool.stop().await;
}

#[tokio::test]
async fn test_demotion_below_half_success_rate() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;
    let a = pool.endpoints()[0].clone();

    // 1 success + 2 failures: rate 0.33 < 0.5, streak 2 < threshold 3
    pool.update_endpoint_metrics(&a, true, Duration::from_millis(50), None);
    pool.update_endpoint_metrics(&a, false, Duration::from_millis(50), Some("err"));
    pool.update_endpoint_metrics(&a, false, Duration::from_millis(50), Some("err"));

    assert_eq!(a.state(), EndpointState::Degraded);
    pool.stop().await;
}

#[tokio::test]
async fn test_promotion_above_eighty_percent_success_rate() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;
    let a = pool.endpoints()[0].clone();

    pool.update_endpoint_metrics(&a, true, Duration::from_millis(50), None);
    pool.update_endpoint_metrics(&a, false, Duration::from_millis(50), Some("err"));
    pool.update_endpoint_metrics(&a, false, Duration::from_millis(50), Some("err"));
    assert_eq!(a.state(), EndpointState::Degraded);

    // Successes until the rate crosses 0.8: 2/3 -> ... -> 13/15 ≈ 0.87
    for _ in 0..12 {
        pool.update_endpoint_metrics(&a, true, Duration::from_millis(50), None);
    }
    assert_eq!(a.state(), EndpointState::Healthy);
    assert!(a.success_rate() > 0.8);
    pool.stop().await;
}

#[tokio::test]
async fn test_success_never_unexcludes() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;
    let a = pool.endpoints()[0].clone();

    for _ in 0..3 {
        pool.update_endpoint_metrics(&a, false, Duration::from_secs(1), Some("down"));
    }
    assert_eq!(a.state(), EndpointState::Excluded);

    // Passive successes must not bring it back; that is the monitor's job
    for _ in 0..10 {
        pool.update_endpoint_metrics(&a, true, Duration::from_millis(10), None);
    }
    assert_eq!(a.state(), EndpointState::Excluded);
    pool.stop().await;
}

// =============================================================================
// MANUAL OVERRIDES
// =============================================================================

#[tokio::test]
async fn test_force_exclude_and_recover() {
    let pool = started_pool(&["https://a.example.com"], LoadBalancingStrategy::RoundRobin).await;
    let a = pool.endpoints()[0].clone();

    pool.force_exclude_endpoint("https://a.example.com").unwrap();
    assert_eq!(a.state(), EndpointState::Excluded);

    pool.force_recover_endpoint("https://a.example.com").unwrap();
    assert_eq!(a.state(), EndpointState::Degraded);
    assert_eq!(a.health_score(), 70.0);
    assert_eq!(a.metrics().total_requests, 0, "metrics reset on recovery");

    let err = pool.force_exclude_endpoint("https://nope.example.com").unwrap_err();
    assert!(matches!(err, PoolError::UnknownEndpoint(_)));
    pool.stop().await;
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test]
async fn test_concurrent_selection_and_updates() {
    let pool = started_pool(
        &["https://a.example.com", "https://b.example.com"],
        LoadBalancingStrategy::Weighted,
    )
    .await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                if let Ok(ep) = pool.select_endpoint() {
                    pool.update_endpoint_metrics(
                        &ep,
                        i % 4 != 0,
                        Duration::from_millis(20),
                        Some("sporadic"),
                    );
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for status in pool.health_status() {
        assert!(status.health_score >= 0.0 && status.health_score <= 100.0);
    }
    pool.stop().await;
}
