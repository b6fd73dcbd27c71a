//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per-backend prober task (prober.rs):
//!     Cycle timer (interval from the live snapshot)
//!     → probe every destination, bounded concurrency
//!     → transport.rs performs the exchange (HTTP GET, bounded timeout)
//!     → outcome folded into the destination's hysteresis counters
//!     → state transition logged + exported, probe noise stays at debug
//!
//! Topology updates:
//!     backend added   → ProberSet::ensure spawns its loop
//!     backend removed → ProberSet::remove stops it (graceful, bounded)
//! ```
//!
//! # Design Decisions
//! - One independent task per backend; a hung upstream only delays its own
//!   backend's cycle
//! - State transitions require consecutive successes/failures
//! - Probe failures are data, not errors; they never leave the loop

pub mod prober;
pub mod transport;

pub use prober::{Prober, ProberSet};
pub use transport::{HttpProbeTransport, ProbeOutcome, ProbeTransport};
