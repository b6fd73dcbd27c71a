//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Request (backend id + headers)
//!     → topology lookup, one snapshot load
//!     → candidate set built, health-filtered
//!     → affinity narrowing (skipped when disabled)
//!         failure → failure policy: continue over full set, or abort
//!     → load balancer picks from what survived
//!     → Dispatch handed to forwarding: destination + in-flight guard
//!       + response mutations (affinity establishment)
//! ```
//!
//! # Design Decisions
//! - The whole decision reads one backend snapshot; concurrent topology
//!   updates are all-or-nothing from the request's point of view
//! - Requests share no mutable state; cancellation is drop-based and
//!   releases the in-flight slot via the guard

pub mod pipeline;

pub use pipeline::{Director, Dispatch};
