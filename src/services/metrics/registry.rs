use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Prometheus metrics for the client's pools and home-chain traffic.
pub struct MetricsRegistry {
    registry: Registry,

    pub rpc_requests_total: CounterVec,
    pub rpc_endpoint_health_score: GaugeVec,
    pub rpc_endpoint_state: GaugeVec,

    pub core_queries_total: CounterVec,
    pub core_query_retries_total: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rpc_requests_total = CounterVec::new(
            Opts::new("uc_rpc_requests_total", "External-chain RPC requests observed by pools"),
            &["chain", "outcome"],
        )?;
        registry.register(Box::new(rpc_requests_total.clone()))?;

        let rpc_endpoint_health_score = GaugeVec::new(
            Opts::new("uc_rpc_endpoint_health_score", "Current endpoint health score [0,100]"),
            &["chain", "endpoint"],
        )?;
        registry.register(Box::new(rpc_endpoint_health_score.clone()))?;

        let rpc_endpoint_state = GaugeVec::new(
            Opts::new(
                "uc_rpc_endpoint_state",
                "Endpoint state (0 healthy, 1 degraded, 2 unhealthy, 3 excluded)",
            ),
            &["chain", "endpoint"],
        )?;
        registry.register(Box::new(rpc_endpoint_state.clone()))?;

        let core_queries_total = CounterVec::new(
            Opts::new("uc_core_queries_total", "Home-chain queries by operation and outcome"),
            &["op", "outcome"],
        )?;
        registry.register(Box::new(core_queries_total.clone()))?;

        let core_query_retries_total = CounterVec::new(
            Opts::new("uc_core_query_retries_total", "Home-chain query retry attempts"),
            &["op"],
        )?;
        registry.register(Box::new(core_query_retries_total.clone()))?;

        Ok(Self {
            registry,
            rpc_requests_total,
            rpc_endpoint_health_score,
            rpc_endpoint_state,
            core_queries_total,
            core_query_retries_total,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
