//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → matcher.rs (host, path-prefix conditions)
//!     → router.rs (priority-ordered lookup)
//!     → backend id for the dispatch pipeline, or explicit no-match
//! ```

pub mod matcher;
pub mod router;

pub use router::Router;
