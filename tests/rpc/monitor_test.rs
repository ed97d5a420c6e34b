use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use universal_client::services::rpc::{
    EndpointState, LoadBalancingStrategy, RpcPool,
};

use crate::common::{pool_config, FlagChecker, MockChainClient, MockFactory};

// =============================================================================
// INTEGRATION TESTS - HEALTH MONITOR
// =============================================================================

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

async fn wait_for_state(
    pool: &Arc<RpcPool<MockChainClient>>,
    url: &str,
    want: EndpointState,
) -> bool {
    for _ in 0..100 {
        let state = pool
            .endpoints()
            .iter()
            .find(|ep| ep.url() == url)
            .unwrap()
            .state();
        if state == want {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test(start_paused = true)]
async fn test_failing_probes_exclude_endpoint() {
    let healthy = Arc::new(AtomicBool::new(false));
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://a.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::new()),
        Some(Arc::new(FlagChecker::new(healthy.clone()))),
    );
    pool.start().await.unwrap();

    // Probes tick every second; threshold is 3 consecutive failures
    assert!(
        wait_for_state(&pool, "https://a.example.com", EndpointState::Excluded).await,
        "monitor should exclude a consistently failing endpoint"
    );
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_window_respected() {
    // The endpoint probe succeeds the whole time; only the recovery window
    // decides when the excluded endpoint may come back.
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://a.example.com", "https://b.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::new()),
        Some(Arc::new(FlagChecker::always_healthy())),
    );
    pool.start().await.unwrap();
    let a = pool.endpoints()[0].clone();

    pool.force_exclude_endpoint("https://a.example.com").unwrap();
    let excluded_at = a.excluded_at().unwrap();

    // Inside the 5 s window: probes succeed but are ignored
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(a.state(), EndpointState::Excluded, "state must hold at t0+3s");

    // Past the window a successful probe re-admits the endpoint as Degraded
    // with reset metrics and the seeded score
    assert!(
        wait_for_state(&pool, "https://a.example.com", EndpointState::Degraded).await,
        "endpoint should recover after the window"
    );
    assert!(excluded_at.elapsed() >= Duration::from_secs(5));
    assert_eq!(a.health_score(), 70.0);
    assert_eq!(a.metrics().total_requests, 0);
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_recovery_probe_extends_exclusion() {
    let healthy = Arc::new(AtomicBool::new(true));
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://a.example.com", "https://b.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::new()),
        Some(Arc::new(FlagChecker::new(healthy.clone()))),
    );
    pool.start().await.unwrap();
    let a = pool.endpoints()[0].clone();

    pool.force_exclude_endpoint("https://a.example.com").unwrap();
    let first_stamp = a.excluded_at().unwrap();

    // Probes fail once the window opens: the exclusion must be extended
    healthy.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(a.state(), EndpointState::Excluded);
    let refreshed = a.excluded_at().unwrap();
    assert!(
        refreshed > first_stamp,
        "failed recovery probe should refresh the exclusion stamp"
    );
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_terminates_monitor() {
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://a.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::new()),
        Some(Arc::new(FlagChecker::always_healthy())),
    );
    pool.start().await.unwrap();

    pool.stop().await;
    // Idempotent: a second stop must not hang or panic
    pool.stop().await;

    assert!(
        pool.endpoints()[0].client().is_none(),
        "stop should release the client handles"
    );
}

#[tokio::test(start_paused = true)]
async fn test_passive_pool_without_checker_never_probes() {
    let pool = RpcPool::new(
        "eip155:1",
        &urls(&["https://a.example.com"]),
        pool_config(LoadBalancingStrategy::RoundRobin),
        Arc::new(MockFactory::new()),
        None,
    );
    pool.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let m = pool.endpoints()[0].metrics();
    assert_eq!(m.total_requests, 0, "no probes without a health checker");
    pool.stop().await;
}
