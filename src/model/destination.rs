//! Destination abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream endpoint within a backend
//! - Track in-flight requests (for least-requests and power-of-two balancing)
//! - Track health state with consecutive-result hysteresis

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

/// Health state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A health state change produced by a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthState,
    pub to: HealthState,
}

/// A single upstream endpoint.
///
/// Health counters are written by the owning backend's prober task, one
/// result per destination per cycle; the request path only reads them.
#[derive(Debug)]
pub struct Destination {
    /// Destination identifier, unique within its backend.
    pub id: String,
    /// Pre-parsed base URL.
    pub address: Url,
    /// Weight for weighted load balancing.
    pub weight: u32,

    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    /// Consecutive failure count.
    consecutive_failures: AtomicUsize,
    /// Consecutive success count.
    consecutive_successes: AtomicUsize,
    /// Number of requests currently dispatched here.
    in_flight: AtomicUsize,
}

impl Destination {
    /// Create a new destination. Starts in the Unknown health state.
    pub fn new(id: impl Into<String>, address: Url, weight: u32) -> Self {
        Self {
            id: id.into(),
            address,
            weight,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current health state.
    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Return true if this destination may receive traffic (Healthy or Unknown).
    pub fn is_eligible(&self) -> bool {
        self.state.load(Ordering::Relaxed) != (HealthState::Unhealthy as u8)
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Mark a request as dispatched here; the guard decrements on drop,
    /// including when the request future is cancelled.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            destination: self.clone(),
        }
    }

    /// Record a successful probe. Returns the transition if the state changed.
    pub fn record_probe_success(&self, healthy_threshold: u32) -> Option<HealthTransition> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let current = self.health();
        if current == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold as usize {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return Some(HealthTransition {
                from: current,
                to: HealthState::Healthy,
            });
        }
        None
    }

    /// Record a failed probe. Returns the transition if the state changed.
    pub fn record_probe_failure(&self, unhealthy_threshold: u32) -> Option<HealthTransition> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        let current = self.health();
        if current == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold as usize {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return Some(HealthTransition {
                from: current,
                to: HealthState::Unhealthy,
            });
        }
        None
    }
}

/// RAII guard holding one in-flight slot on a destination.
#[derive(Debug)]
pub struct InFlightGuard {
    destination: Arc<Destination>,
}

impl Deref for InFlightGuard {
    type Target = Destination;
    fn deref(&self) -> &Self::Target {
        &self.destination
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.destination.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
