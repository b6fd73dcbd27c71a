//! Least-requests load balancing strategy.

use std::sync::Arc;

use crate::balancer::LoadBalancingPolicy;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Least-requests selector.
/// Picks the destination with the fewest in-flight requests, as maintained
/// by the dispatch pipeline's in-flight guards.
#[derive(Debug, Default)]
pub struct LeastRequests;

impl LeastRequests {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingPolicy for LeastRequests {
    fn pick(&self, candidates: &CandidateSet) -> Option<Arc<Destination>> {
        // In case of tie, the first one is selected (stability).
        candidates.iter().min_by_key(|d| d.in_flight()).cloned()
    }

    fn name(&self) -> &'static str {
        "least-requests"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> CandidateSet {
        CandidateSet::new(
            ids.iter()
                .map(|id| {
                    Arc::new(Destination::new(
                        *id,
                        "http://127.0.0.1:3000".parse().unwrap(),
                        1,
                    ))
                })
                .collect(),
        )
    }

    #[test]
    fn picks_least_loaded() {
        let policy = LeastRequests::new();
        let candidates = set(&["a", "b", "c"]);

        let _a = candidates.find("a").unwrap().begin_request();
        let _b1 = candidates.find("b").unwrap().begin_request();
        let _b2 = candidates.find("b").unwrap().begin_request();

        assert_eq!(policy.pick(&candidates).unwrap().id, "c");
    }

    #[test]
    fn released_guards_rebalance() {
        let policy = LeastRequests::new();
        let candidates = set(&["a", "b"]);

        let guard = candidates.find("a").unwrap().begin_request();
        assert_eq!(policy.pick(&candidates).unwrap().id, "b");

        drop(guard);
        // Tie again; first wins.
        assert_eq!(policy.pick(&candidates).unwrap().id, "a");
    }
}
