pub mod registry;

pub use registry::MetricsRegistry;

use lazy_static::lazy_static;

use crate::services::rpc::endpoint::EndpointState;

lazy_static! {
    static ref GLOBAL: MetricsRegistry =
        MetricsRegistry::new().expect("metrics registration cannot fail on a fresh registry");
}

/// Process-wide registry; embedders expose `global().gather()` on their
/// scrape endpoint.
pub fn global() -> &'static MetricsRegistry {
    &GLOBAL
}

pub(crate) fn record_pool_request(chain: &str, outcome: &str) {
    GLOBAL
        .rpc_requests_total
        .with_label_values(&[chain, outcome])
        .inc();
}

pub(crate) fn observe_endpoint(chain: &str, url: &str, score: f64, state: EndpointState) {
    GLOBAL
        .rpc_endpoint_health_score
        .with_label_values(&[chain, url])
        .set(score);
    let state_value = match state {
        EndpointState::Healthy => 0,
        EndpointState::Degraded => 1,
        EndpointState::Unhealthy => 2,
        EndpointState::Excluded => 3,
    };
    GLOBAL
        .rpc_endpoint_state
        .with_label_values(&[chain, url])
        .set(state_value as f64);
}

pub(crate) fn record_core_query(op: &str, outcome: &str) {
    GLOBAL
        .core_queries_total
        .with_label_values(&[op, outcome])
        .inc();
}

pub(crate) fn record_core_retry(op: &str) {
    GLOBAL.core_query_retries_total.with_label_values(&[op]).inc();
}
