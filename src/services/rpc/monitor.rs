use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::rpc::endpoint::{Endpoint, EndpointState};
use crate::services::rpc::pool::{HealthChecker, RpcPool};

/// Launch the pool's health monitor task. Ticks at the configured interval,
/// with one sweep immediately on start, and exits when the stop channel
/// fires or closes.
pub(crate) fn spawn<C: Send + Sync + 'static>(
    pool: Arc<RpcPool<C>>,
    checker: Arc<dyn HealthChecker<C>>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(pool.config().health_check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    check_all(&pool, &checker).await;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(chain = %pool.chain(), "health monitor stopped");
    })
}

/// Probe every endpoint concurrently. Probe outcomes never propagate out of
/// the monitor; they only move metrics and state.
async fn check_all<C: Send + Sync + 'static>(
    pool: &Arc<RpcPool<C>>,
    checker: &Arc<dyn HealthChecker<C>>,
) {
    let mut probes = JoinSet::new();
    for ep in pool.endpoints() {
        let pool = pool.clone();
        let checker = checker.clone();
        let ep = ep.clone();
        probes.spawn(async move {
            probe_endpoint(&pool, checker.as_ref(), &ep).await;
        });
    }
    while probes.join_next().await.is_some() {}
}

async fn probe_endpoint<C: Send + Sync + 'static>(
    pool: &Arc<RpcPool<C>>,
    checker: &dyn HealthChecker<C>,
    endpoint: &Arc<Endpoint<C>>,
) {
    // Endpoints whose client never materialized are skipped; the pool either
    // failed startup or runs below its minimum on purpose.
    let Some(client) = endpoint.client() else {
        return;
    };

    let started = Instant::now();
    let outcome = match tokio::time::timeout(
        pool.config().request_timeout(),
        checker.check_health(client.as_ref()),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("health check timed out".to_string()),
    };
    let latency = started.elapsed();

    if endpoint.state() == EndpointState::Excluded {
        handle_excluded(pool, endpoint, outcome);
    } else {
        match outcome {
            Ok(()) => pool.update_endpoint_metrics(endpoint, true, latency, None),
            Err(e) => pool.update_endpoint_metrics(endpoint, false, latency, Some(&e)),
        }
    }
}

/// Excluded endpoints sit out probes until the recovery window has elapsed.
/// Past it, a good probe re-admits the endpoint as Degraded with reset
/// metrics; a bad one extends the exclusion.
fn handle_excluded<C: Send + Sync + 'static>(
    pool: &Arc<RpcPool<C>>,
    endpoint: &Arc<Endpoint<C>>,
    outcome: Result<(), String>,
) {
    let Some(excluded_at) = endpoint.excluded_at() else {
        return;
    };
    if excluded_at.elapsed() < pool.config().recovery_interval() {
        return;
    }

    match outcome {
        Ok(()) => {
            info!(
                chain = %pool.chain(),
                endpoint = %endpoint.url(),
                "excluded endpoint recovered, re-entering as degraded"
            );
            pool.recover_endpoint(endpoint);
        }
        Err(e) => {
            warn!(
                chain = %pool.chain(),
                endpoint = %endpoint.url(),
                error = %e,
                "recovery probe failed, extending exclusion"
            );
            endpoint.refresh_excluded_at();
        }
    }
}
