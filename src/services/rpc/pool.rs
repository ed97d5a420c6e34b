use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::services::metrics;
use crate::services::rpc::config::PoolConfig;
use crate::services::rpc::endpoint::{Endpoint, EndpointState};
use crate::services::rpc::monitor;
use crate::services::rpc::selector::EndpointSelector;

/// Success-rate thresholds for the Degraded <-> Healthy transitions.
const PROMOTE_SUCCESS_RATE: f64 = 0.8;
const DEMOTE_SUCCESS_RATE: f64 = 0.5;

/// Health score seeded into an endpoint that re-enters the pool after
/// exclusion.
pub const RECOVERY_SEED_SCORE: f64 = 70.0;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no healthy endpoints available")]
    NoHealthyEndpoints,
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("client construction failed for {url}: {message}")]
    ClientConstruction { url: String, message: String },
    #[error("pool start failed: {healthy} healthy endpoints, minimum is {minimum}")]
    InsufficientHealthyEndpoints { healthy: usize, minimum: usize },
    #[error("health check failed: {0}")]
    HealthCheck(String),
    #[error("rpc call failed: {0}")]
    Rpc(String),
}

/// Builds (and eventually closes) the per-chain client handle for one
/// endpoint URL.
#[async_trait]
pub trait ClientFactory<C>: Send + Sync {
    async fn create(&self, url: &str) -> Result<C, PoolError>;

    /// Release any resources held by the client. Errors are logged by the
    /// pool, never propagated.
    async fn close(&self, _client: &C) -> Result<(), PoolError> {
        Ok(())
    }
}

/// Chain-specific liveness probe run by the health monitor.
#[async_trait]
pub trait HealthChecker<C>: Send + Sync {
    async fn check_health(&self, client: &C) -> Result<(), PoolError>;
}

pub(crate) struct MonitorHandle {
    pub(crate) stop: watch::Sender<bool>,
    pub(crate) task: JoinHandle<()>,
}

/// Endpoint pool for a single external chain.
///
/// Owns every [`Endpoint`] for the chain, routes passive request outcomes
/// through the state machine, and runs the active health monitor when a
/// [`HealthChecker`] is configured. Without one the pool degrades to
/// passive-only operation.
pub struct RpcPool<C> {
    chain: String,
    endpoints: Vec<Arc<Endpoint<C>>>,
    selector: EndpointSelector,
    config: PoolConfig,
    factory: Arc<dyn ClientFactory<C>>,
    checker: Option<Arc<dyn HealthChecker<C>>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl<C: Send + Sync + 'static> RpcPool<C> {
    pub fn new(
        chain: impl Into<String>,
        urls: &[String],
        config: PoolConfig,
        factory: Arc<dyn ClientFactory<C>>,
        checker: Option<Arc<dyn HealthChecker<C>>>,
    ) -> Arc<Self> {
        let config = config.normalized();
        Arc::new(Self {
            chain: chain.into(),
            endpoints: urls
                .iter()
                .map(|url| Arc::new(Endpoint::new(url.clone())))
                .collect(),
            selector: EndpointSelector::new(config.load_balancing_strategy),
            config,
            factory,
            checker,
            monitor: Mutex::new(None),
        })
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint<C>>] {
        &self.endpoints
    }

    /// Build a client for every endpoint and launch the health monitor.
    ///
    /// A factory failure marks the endpoint `Unhealthy` but does not abort
    /// startup unless the surviving healthy count drops below
    /// `min_healthy_endpoints`.
    pub async fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        for ep in &self.endpoints {
            match self.factory.create(ep.url()).await {
                Ok(client) => ep.attach_client(Arc::new(client)),
                Err(e) => {
                    warn!(
                        chain = %self.chain,
                        endpoint = %ep.url(),
                        error = %e,
                        "client construction failed, marking endpoint unhealthy"
                    );
                    ep.set_state(EndpointState::Unhealthy);
                }
            }
        }

        let healthy = self.endpoints.iter().filter(|ep| ep.is_healthy()).count();
        if healthy < self.config.min_healthy_endpoints {
            return Err(PoolError::InsufficientHealthyEndpoints {
                healthy,
                minimum: self.config.min_healthy_endpoints,
            });
        }

        match &self.checker {
            Some(checker) => {
                let (stop_tx, stop_rx) = watch::channel(false);
                let task = monitor::spawn(self.clone(), checker.clone(), stop_rx);
                *self.monitor.lock().await = Some(MonitorHandle {
                    stop: stop_tx,
                    task,
                });
            }
            None => {
                debug!(
                    chain = %self.chain,
                    "no health checker configured, pool runs passive-only"
                );
            }
        }

        info!(
            chain = %self.chain,
            endpoints = self.endpoints.len(),
            healthy,
            "rpc pool started"
        );
        Ok(())
    }

    /// Stop the health monitor, wait for it, then close every client.
    /// Close failures are logged and swallowed.
    pub async fn stop(&self) {
        if let Some(handle) = self.monitor.lock().await.take() {
            let _ = handle.stop.send(true);
            let _ = handle.task.await;
        }

        for ep in &self.endpoints {
            if let Some(client) = ep.detach_client() {
                if let Err(e) = self.factory.close(&client).await {
                    warn!(
                        chain = %self.chain,
                        endpoint = %ep.url(),
                        error = %e,
                        "closing endpoint client failed"
                    );
                }
            }
        }
        info!(chain = %self.chain, "rpc pool stopped");
    }

    /// Pick a healthy endpoint per the configured strategy and stamp its
    /// last-used time.
    pub fn select_endpoint(&self) -> Result<Arc<Endpoint<C>>, PoolError> {
        let healthy: Vec<Arc<Endpoint<C>>> = self
            .endpoints
            .iter()
            .filter(|ep| ep.is_healthy())
            .cloned()
            .collect();

        let picked = self
            .selector
            .select(&healthy)
            .ok_or(PoolError::NoHealthyEndpoints)?;
        picked.mark_used();
        Ok(picked)
    }

    /// Passive state machine fed by request outcomes.
    ///
    /// Success may promote Degraded -> Healthy; failure may demote
    /// Healthy -> Degraded or, at the consecutive-failure threshold, exclude
    /// the endpoint. Recovery out of `Excluded` is the monitor's job alone.
    pub fn update_endpoint_metrics(
        &self,
        endpoint: &Endpoint<C>,
        success: bool,
        latency: Duration,
        error: Option<&str>,
    ) {
        if success {
            endpoint.record_success(latency);
            metrics::record_pool_request(&self.chain, "success");
            if endpoint.state() == EndpointState::Degraded
                && endpoint.success_rate() > PROMOTE_SUCCESS_RATE
            {
                info!(
                    chain = %self.chain,
                    endpoint = %endpoint.url(),
                    "endpoint promoted to healthy"
                );
                endpoint.set_state(EndpointState::Healthy);
            }
        } else {
            endpoint.record_failure(error.unwrap_or("unknown error"), latency);
            metrics::record_pool_request(&self.chain, "failure");
            let state = endpoint.state();
            if state != EndpointState::Excluded
                && endpoint.consecutive_failures() >= self.config.unhealthy_threshold
            {
                warn!(
                    chain = %self.chain,
                    endpoint = %endpoint.url(),
                    failures = endpoint.consecutive_failures(),
                    "endpoint excluded after consecutive failures"
                );
                endpoint.set_state(EndpointState::Excluded);
            } else if state == EndpointState::Healthy
                && endpoint.success_rate() < DEMOTE_SUCCESS_RATE
            {
                warn!(
                    chain = %self.chain,
                    endpoint = %endpoint.url(),
                    "endpoint demoted to degraded"
                );
                endpoint.set_state(EndpointState::Degraded);
            }
        }
        metrics::observe_endpoint(
            &self.chain,
            endpoint.url(),
            endpoint.health_score(),
            endpoint.state(),
        );
    }

    /// Operational override: exclude an endpoint regardless of its metrics.
    pub fn force_exclude_endpoint(&self, url: &str) -> Result<(), PoolError> {
        let ep = self.endpoint_by_url(url)?;
        ep.set_state(EndpointState::Excluded);
        info!(chain = %self.chain, endpoint = %url, "endpoint force-excluded");
        Ok(())
    }

    /// Operational override: bring an endpoint back as Degraded with reset
    /// metrics.
    pub fn force_recover_endpoint(&self, url: &str) -> Result<(), PoolError> {
        let ep = self.endpoint_by_url(url)?;
        self.recover_endpoint(&ep);
        info!(chain = %self.chain, endpoint = %url, "endpoint force-recovered");
        Ok(())
    }

    /// Recovery path shared by the monitor and the manual override: metrics
    /// reset with a seeded score, state back to Degraded.
    pub(crate) fn recover_endpoint(&self, endpoint: &Endpoint<C>) {
        endpoint.reset_metrics_with_score(RECOVERY_SEED_SCORE);
        endpoint.set_state(EndpointState::Degraded);
        metrics::observe_endpoint(
            &self.chain,
            endpoint.url(),
            endpoint.health_score(),
            endpoint.state(),
        );
    }

    fn endpoint_by_url(&self, url: &str) -> Result<Arc<Endpoint<C>>, PoolError> {
        self.endpoints
            .iter()
            .find(|ep| ep.url() == url)
            .cloned()
            .ok_or_else(|| PoolError::UnknownEndpoint(url.to_string()))
    }

    /// Per-endpoint health summary, mostly for operational introspection.
    pub fn health_status(&self) -> Vec<EndpointStatus> {
        self.endpoints
            .iter()
            .map(|ep| {
                let m = ep.metrics();
                EndpointStatus {
                    url: ep.url().to_string(),
                    state: ep.state(),
                    health_score: m.health_score,
                    total_requests: m.total_requests,
                    success_rate: m.success_rate,
                    consecutive_failures: m.consecutive_failures,
                    avg_latency: m.avg_latency,
                    last_error: m.last_error,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub url: String,
    pub state: EndpointState,
    pub health_score: f64,
    pub total_requests: u64,
    pub success_rate: f64,
    pub consecutive_failures: u64,
    pub avg_latency: Duration,
    pub last_error: Option<String>,
}
