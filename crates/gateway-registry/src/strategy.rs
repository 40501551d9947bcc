use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::record::RegisteredService;

/// Load-balancing strategy selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbStrategy {
    #[default]
    RoundRobin,
    LeastConn,
    Weighted,
    Random,
}

/// Holds the round-robin counter; one per service type so independent
/// candidate sets don't interfere with each other's rotation.
#[derive(Debug, Default)]
pub struct LoadBalancer {
    round_robin_counter: AtomicUsize,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects an index into `candidates` (assumed already filtered to
    /// eligible adapters and sorted by stable adapter id for determinism).
    /// Returns `None` only if `candidates` is empty.
    pub fn select<'a>(&self, strategy: LbStrategy, candidates: &'a [&'a RegisteredService]) -> Option<&'a RegisteredService> {
        if candidates.is_empty() {
            return None;
        }
        match strategy {
            LbStrategy::RoundRobin => {
                let index = self.round_robin_counter.fetch_add(1, Ordering::AcqRel) % candidates.len();
                Some(candidates[index])
            }
            LbStrategy::LeastConn => candidates.iter().copied().min_by(|a, b| {
                a.active_connections()
                    .cmp(&b.active_connections())
                    .then(a.recent_latency_ewma_micros().total_cmp(&b.recent_latency_ewma_micros()))
            }),
            LbStrategy::Weighted => {
                let weights: Vec<f64> = candidates
                    .iter()
                    .map(|c| (c.weight * (1.0 - c.error_rate_recent())).max(0.0001))
                    .collect();
                let total: f64 = weights.iter().sum();
                let mut pick = rand::rng().random_range(0.0..total);
                for (candidate, weight) in candidates.iter().zip(weights.iter()) {
                    if pick < *weight {
                        return Some(candidate);
                    }
                    pick -= weight;
                }
                candidates.last().copied()
            }
            LbStrategy::Random => {
                let index = rand::rng().random_range(0..candidates.len());
                Some(candidates[index])
            }
        }
    }
}
