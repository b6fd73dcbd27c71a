//! Runtime model subsystem.
//!
//! # Data Flow
//! ```text
//! Topology updates (config load/reload, serialized)
//!     → topology.rs (arena of backends by id)
//!     → backend.rs (atomic snapshot swap per backend)
//!     → destination.rs (endpoint entities with health + in-flight state)
//!
//! Request path (concurrent, lock-free reads):
//!     backend lookup → snapshot load → candidates.rs (immutable set)
//! ```
//!
//! # Design Decisions
//! - Consumers hold ids or snapshots, never long-lived entity references,
//!   so removal cannot dangle
//! - Health state lives on the destination entity and survives config
//!   updates that leave the destination in place
//! - Candidate sets are built once per request and only ever narrowed by
//!   producing a new set

pub mod backend;
pub mod candidates;
pub mod destination;
pub mod topology;

pub use backend::{Backend, BackendSnapshot};
pub use candidates::CandidateSet;
pub use destination::{Destination, HealthState, HealthTransition, InFlightGuard};
pub use topology::{Topology, TopologyChanges};
