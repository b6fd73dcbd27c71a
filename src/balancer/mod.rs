//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch pipeline → candidate set (already health-filtered, possibly
//! affinity-narrowed)
//!     → select():
//!         empty set     → NoAvailableDestination
//!         one candidate → returned as-is, no policy involved
//!         otherwise     → bound policy picks:
//!             round_robin.rs     (per-backend cursor)
//!             least_requests.rs  (fewest in-flight)
//!             weighted_random.rs (weight-proportional)
//!             power_of_two.rs    (two random, fewer in-flight wins)
//! ```
//!
//! # Design Decisions
//! - Policies are resolved from their string id once per topology update,
//!   not per request
//! - A policy instance belongs to one backend; cursor state is per backend
//! - Selection never allocates; it runs on the request hot path

use std::sync::Arc;

use thiserror::Error;

use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

pub mod least_requests;
pub mod power_of_two;
pub mod round_robin;
pub mod weighted_random;

pub use least_requests::LeastRequests;
pub use power_of_two::PowerOfTwo;
pub use round_robin::RoundRobin;
pub use weighted_random::WeightedRandom;

/// Returned when selection has nothing to pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no available destination")]
pub struct NoAvailableDestination;

/// A destination selection strategy bound to one backend.
pub trait LoadBalancingPolicy: Send + Sync + std::fmt::Debug {
    /// Pick one destination from a candidate set with at least two members.
    fn pick(&self, candidates: &CandidateSet) -> Option<Arc<Destination>>;

    /// Get the policy id.
    fn name(&self) -> &'static str;
}

/// Select one destination from the candidate set.
///
/// An empty set is an explicit error, and a single candidate is returned
/// without consulting the policy so that selection stays deterministic for
/// the degenerate case.
pub fn select(
    policy: &dyn LoadBalancingPolicy,
    candidates: &CandidateSet,
) -> Result<Arc<Destination>, NoAvailableDestination> {
    match candidates.len() {
        0 => Err(NoAvailableDestination),
        1 => candidates.get(0).cloned().ok_or(NoAvailableDestination),
        _ => policy.pick(candidates).ok_or(NoAvailableDestination),
    }
}

/// Policy ids accepted in configuration.
pub const POLICY_IDS: &[&str] = &[
    "round-robin",
    "least-requests",
    "weighted-random",
    "power-of-two",
];

/// Whether a policy id is recognized.
pub fn is_known_policy(id: &str) -> bool {
    POLICY_IDS.contains(&id)
}

/// Resolve a policy id into a fresh strategy instance for one backend.
pub fn resolve_policy(id: &str) -> Option<Arc<dyn LoadBalancingPolicy>> {
    match id {
        "round-robin" => Some(Arc::new(RoundRobin::new())),
        "least-requests" => Some(Arc::new(LeastRequests::new())),
        "weighted-random" => Some(Arc::new(WeightedRandom::new())),
        "power-of-two" => Some(Arc::new(PowerOfTwo::new())),
        _ => None,
    }
}
