//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define director metrics (dispatches, failures, destination health)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `director_requests_total` (counter): dispatch outcomes by backend, status
//! - `director_request_duration_seconds` (histogram): decision-to-response latency
//! - `director_no_available_destination_total` (counter): distinct from upstream 5xx
//! - `director_affinity_failures_total` (counter): by failure kind and recovery
//! - `director_destination_health` (gauge): 1=eligible, 0=unhealthy
//!
//! # Design Decisions
//! - Metric updates are cheap (atomic increments behind the recorder)
//! - "No available destination" gets its own counter so operators can
//!   alert on it separately from backend errors

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::affinity::AffinityFailure;
use crate::model::destination::Destination;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record a completed request through the front end.
pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "director_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string(),
    )
    .increment(1);
    histogram!(
        "director_request_duration_seconds",
        "backend" => backend.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request that found nothing to dispatch to.
pub fn record_no_available_destination(backend: &str) {
    counter!(
        "director_no_available_destination_total",
        "backend" => backend.to_string(),
    )
    .increment(1);
}

/// Record an affinity resolution failure and whether the policy recovered it.
pub fn record_affinity_failure(backend: &str, failure: AffinityFailure, recovered: bool) {
    let kind = match failure {
        AffinityFailure::KeyExtractionFailed => "key_extraction_failed",
        AffinityFailure::DestinationNotFound => "destination_not_found",
    };
    counter!(
        "director_affinity_failures_total",
        "backend" => backend.to_string(),
        "kind" => kind,
        "recovered" => if recovered { "true" } else { "false" },
    )
    .increment(1);
}

/// Export a destination's current eligibility.
pub fn record_destination_health(backend: &str, destination: &Destination) {
    gauge!(
        "director_destination_health",
        "backend" => backend.to_string(),
        "destination" => destination.id.clone(),
    )
    .set(if destination.is_eligible() { 1.0 } else { 0.0 });
}
