//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured events with stable field names for machine parsing
//! - Health transitions and topology changes at info; per-probe and
//!   per-request noise at debug
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
