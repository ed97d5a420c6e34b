use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::services::rpc::endpoint::Endpoint;

/// How the pool spreads requests over its healthy endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    Weighted,
}

/// Picks one endpoint out of a pre-filtered healthy slice. The selector never
/// looks at endpoint state itself; the pool filters before delegating.
pub struct EndpointSelector {
    strategy: LoadBalancingStrategy,
    cursor: AtomicU64,
}

impl EndpointSelector {
    pub fn new(strategy: LoadBalancingStrategy) -> Self {
        Self {
            strategy,
            cursor: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    pub fn select<C>(&self, healthy: &[Arc<Endpoint<C>>]) -> Option<Arc<Endpoint<C>>> {
        if healthy.is_empty() {
            return None;
        }
        match self.strategy {
            LoadBalancingStrategy::RoundRobin => Some(self.round_robin(healthy)),
            LoadBalancingStrategy::Weighted => Some(self.weighted(healthy)),
        }
    }

    fn round_robin<C>(&self, healthy: &[Arc<Endpoint<C>>]) -> Arc<Endpoint<C>> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % healthy.len();
        healthy[idx].clone()
    }

    /// Weighted draw over current health scores; an all-zero total falls back
    /// to round-robin.
    fn weighted<C>(&self, healthy: &[Arc<Endpoint<C>>]) -> Arc<Endpoint<C>> {
        let weights: Vec<f64> = healthy.iter().map(|ep| ep.health_score()).collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            return self.round_robin(healthy);
        }

        let draw = rand::random::<f64>() * total;
        let mut cumulative = 0.0;
        for (ep, weight) in healthy.iter().zip(&weights) {
            cumulative += weight;
            if cumulative >= draw {
                return ep.clone();
            }
        }

        // Floating point edges can leave the draw just past the last bucket.
        healthy[healthy.len() - 1].clone()
    }
}
