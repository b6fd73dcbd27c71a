//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::balancer::LoadBalancingPolicy;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Round-robin selector.
/// Stores an internal counter to rotate through the candidate set.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingPolicy for RoundRobin {
    fn pick(&self, candidates: &CandidateSet) -> Option<Arc<Destination>> {
        if candidates.is_empty() {
            return None;
        }
        // fetch_add wraps on overflow, which keeps the rotation monotonic.
        let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates.get(cursor % candidates.len()).cloned()
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
