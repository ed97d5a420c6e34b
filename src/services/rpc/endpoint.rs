use std::sync::Arc;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Smoothing factor for the latency EMA.
const LATENCY_EMA_ALPHA: f64 = 0.1;

/// Health state of a pool endpoint.
///
/// `Excluded` endpoints are invisible to selection; only the health
/// monitor's recovery path may bring them back (as `Degraded`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Healthy,
    Degraded,
    Unhealthy,
    Excluded,
}

impl EndpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointState::Healthy => "healthy",
            EndpointState::Degraded => "degraded",
            EndpointState::Unhealthy => "unhealthy",
            EndpointState::Excluded => "excluded",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MetricsInner {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    consecutive_failures: u64,
    last_success_time: Option<Instant>,
    last_error_time: Option<Instant>,
    last_error: Option<String>,
    /// EMA over observed latencies, in seconds.
    avg_latency_secs: f64,
    health_score: f64,
}

impl MetricsInner {
    fn fresh() -> Self {
        Self {
            health_score: 100.0,
            ..Default::default()
        }
    }

    fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    fn update_latency(&mut self, latency: Duration) {
        let observed = latency.as_secs_f64();
        if self.avg_latency_secs == 0.0 {
            self.avg_latency_secs = observed;
        } else {
            self.avg_latency_secs =
                LATENCY_EMA_ALPHA * observed + (1.0 - LATENCY_EMA_ALPHA) * self.avg_latency_secs;
        }
    }

    /// Score = success_rate * 100 - latency_penalty - consecutive_failure_penalty,
    /// clamped to [0, 100]. A fresh endpoint scores 100.
    fn recompute_score(&mut self) {
        let latency_penalty = ((self.avg_latency_secs - 1.0) * 5.0).clamp(0.0, 20.0);
        let failure_penalty = (self.consecutive_failures as f64 * 10.0).min(50.0);
        let score = self.success_rate() * 100.0 - latency_penalty - failure_penalty;
        self.health_score = score.clamp(0.0, 100.0);
    }
}

/// Read-only view of an endpoint's metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u64,
    pub last_success_time: Option<Instant>,
    pub last_error_time: Option<Instant>,
    pub last_error: Option<String>,
    pub avg_latency: Duration,
    pub health_score: f64,
    pub success_rate: f64,
}

/// One member of an endpoint pool: a URL, an opaque client handle and the
/// health bookkeeping around it.
///
/// The handle is attached once by the pool's client factory and never
/// replaced afterwards. State, usage stamps and metrics sit behind their own
/// locks, which are never held across an await point.
pub struct Endpoint<C> {
    url: String,
    client: RwLock<Option<Arc<C>>>,
    state: RwLock<EndpointState>,
    excluded_at: RwLock<Option<Instant>>,
    last_used: RwLock<Option<Instant>>,
    metrics: Mutex<MetricsInner>,
}

impl<C> Endpoint<C> {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: RwLock::new(None),
            state: RwLock::new(EndpointState::Healthy),
            excluded_at: RwLock::new(None),
            last_used: RwLock::new(None),
            metrics: Mutex::new(MetricsInner::fresh()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> Option<Arc<C>> {
        self.client.read().unwrap().clone()
    }

    pub(crate) fn attach_client(&self, client: Arc<C>) {
        *self.client.write().unwrap() = Some(client);
    }

    pub(crate) fn detach_client(&self) -> Option<Arc<C>> {
        self.client.write().unwrap().take()
    }

    pub fn state(&self) -> EndpointState {
        *self.state.read().unwrap()
    }

    /// Store the new state; a transition into `Excluded` stamps `excluded_at`.
    pub fn set_state(&self, state: EndpointState) {
        *self.state.write().unwrap() = state;
        if state == EndpointState::Excluded {
            *self.excluded_at.write().unwrap() = Some(Instant::now());
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(
            self.state(),
            EndpointState::Healthy | EndpointState::Degraded
        )
    }

    /// Valid only while the endpoint is `Excluded`.
    pub fn excluded_at(&self) -> Option<Instant> {
        *self.excluded_at.read().unwrap()
    }

    /// Extend the exclusion window after a failed recovery probe.
    pub(crate) fn refresh_excluded_at(&self) {
        *self.excluded_at.write().unwrap() = Some(Instant::now());
    }

    pub fn last_used(&self) -> Option<Instant> {
        *self.last_used.read().unwrap()
    }

    pub(crate) fn mark_used(&self) {
        *self.last_used.write().unwrap() = Some(Instant::now());
    }

    /// Record a successful request. Resets the consecutive failure streak and
    /// folds the observed latency into the EMA.
    pub fn record_success(&self, latency: Duration) {
        let mut m = self.metrics.lock().unwrap();
        m.total_requests += 1;
        m.successful_requests += 1;
        m.consecutive_failures = 0;
        m.last_success_time = Some(Instant::now());
        m.update_latency(latency);
        m.recompute_score();
    }

    /// Record a failed request. The latency EMA only moves when the failure
    /// carries a positive latency observation.
    pub fn record_failure(&self, error: &str, latency: Duration) {
        let mut m = self.metrics.lock().unwrap();
        m.total_requests += 1;
        m.failed_requests += 1;
        m.consecutive_failures += 1;
        m.last_error_time = Some(Instant::now());
        m.last_error = Some(error.to_string());
        if latency > Duration::ZERO {
            m.update_latency(latency);
        }
        m.recompute_score();
    }

    /// Wipe the metrics and seed the health score, used when an excluded
    /// endpoint re-enters the pool.
    pub(crate) fn reset_metrics_with_score(&self, score: f64) {
        let mut m = self.metrics.lock().unwrap();
        *m = MetricsInner::fresh();
        m.health_score = score.clamp(0.0, 100.0);
    }

    pub fn health_score(&self) -> f64 {
        self.metrics.lock().unwrap().health_score
    }

    pub fn success_rate(&self) -> f64 {
        self.metrics.lock().unwrap().success_rate()
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.metrics.lock().unwrap().consecutive_failures
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let m = self.metrics.lock().unwrap();
        MetricsSnapshot {
            total_requests: m.total_requests,
            successful_requests: m.successful_requests,
            failed_requests: m.failed_requests,
            consecutive_failures: m.consecutive_failures,
            last_success_time: m.last_success_time,
            last_error_time: m.last_error_time,
            last_error: m.last_error.clone(),
            avg_latency: Duration::from_secs_f64(m.avg_latency_secs),
            health_score: m.health_score,
            success_rate: m.success_rate(),
        }
    }
}

impl<C> std::fmt::Debug for Endpoint<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("state", &self.state())
            .field("health_score", &self.health_score())
            .finish_non_exhaustive()
    }
}
