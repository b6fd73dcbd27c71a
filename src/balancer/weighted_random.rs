//! Weighted-random load balancing strategy.

use std::sync::Arc;

use crate::balancer::LoadBalancingPolicy;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Weighted-random selector.
/// Each candidate is chosen with probability proportional to its weight.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingPolicy for WeightedRandom {
    fn pick(&self, candidates: &CandidateSet) -> Option<Arc<Destination>> {
        let total: u64 = candidates.iter().map(|d| u64::from(d.weight)).sum();
        if total == 0 {
            return None;
        }

        let mut roll = fastrand::u64(0..total);
        for destination in candidates.iter() {
            let weight = u64::from(destination.weight);
            if roll < weight {
                return Some(destination.clone());
            }
            roll -= weight;
        }
        // Unreachable: roll < total and the weights sum to total.
        None
    }

    fn name(&self) -> &'static str {
        "weighted-random"
    }
}
