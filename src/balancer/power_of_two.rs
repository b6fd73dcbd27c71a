//! Power-of-two-choices load balancing strategy.

use std::sync::Arc;

use crate::balancer::LoadBalancingPolicy;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Power-of-two-choices selector.
/// Samples two distinct candidates at random and takes the one with fewer
/// in-flight requests. Near-least-loaded behavior at O(1) cost.
#[derive(Debug, Default)]
pub struct PowerOfTwo;

impl PowerOfTwo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingPolicy for PowerOfTwo {
    fn pick(&self, candidates: &CandidateSet) -> Option<Arc<Destination>> {
        let len = candidates.len();
        if len < 2 {
            return candidates.get(0).cloned();
        }

        let first = fastrand::usize(0..len);
        let mut second = fastrand::usize(0..len - 1);
        if second >= first {
            second += 1;
        }

        let a = candidates.get(first)?;
        let b = candidates.get(second)?;
        if b.in_flight() < a.in_flight() {
            Some(b.clone())
        } else {
            Some(a.clone())
        }
    }

    fn name(&self) -> &'static str {
        "power-of-two"
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
    fn avoids_the_loaded_destination_with_two_candidates() {
        let policy = PowerOfTwo::new();
        let candidates = set(&["busy", "idle"]);

        let _g1 = candidates.find("busy").unwrap().begin_request();
        let _g2 = candidates.find("busy").unwrap().begin_request();

        // With exactly two candidates both are always sampled, so the idle
        // one must win every time.
        for _ in 0..20 {
            assert_eq!(policy.pick(&candidates).unwrap().id, "idle");
        }
    }

    #[test]
    fn samples_are_members() {
        let policy = PowerOfTwo::new();
        let candidates = set(&["a", "b", "c", "d"]);
        for _ in 0..100 {
            let picked = policy.pick(&candidates).unwrap();
            assert!(candidates.find(&picked.id).is_some());
        }
    }
}
