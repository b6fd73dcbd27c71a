//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a logical upstream service and its destinations
//! - Hold the current config snapshot, swapped atomically on update
//! - Produce per-request candidate sets filtered by health

use std::sync::Arc;

use arc_swap::ArcSwap;
use url::Url;

use crate::affinity::{self, AffinityBinding};
use crate::balancer::{self, LoadBalancingPolicy};
use crate::config::schema::{BackendConfig, NoEligibleBehavior};
use crate::config::validation::ValidationError;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Everything a request needs to make a decision for one backend,
/// resolved once at update time: the raw config, the bound policy objects,
/// and the destination entities.
///
/// Requests load the whole snapshot in one step and never observe a
/// destination list from one update paired with policies from another.
pub struct BackendSnapshot {
    pub config: BackendConfig,
    pub policy: Arc<dyn LoadBalancingPolicy>,
    pub affinity: Option<AffinityBinding>,
    pub destinations: Vec<Arc<Destination>>,
}

impl BackendSnapshot {
    /// Build the initial candidate set for one request: Healthy-or-Unknown
    /// destinations only. When that leaves nothing, the backend's explicit
    /// `on_no_eligible` choice decides between failing fast (empty set) and
    /// falling back to the full destination list.
    pub fn candidates(&self) -> CandidateSet {
        let eligible: Vec<Arc<Destination>> = self
            .destinations
            .iter()
            .filter(|d| d.is_eligible())
            .cloned()
            .collect();

        if !eligible.is_empty() {
            return CandidateSet::new(eligible);
        }
        match self.config.on_no_eligible {
            NoEligibleBehavior::Fail => CandidateSet::default(),
            NoEligibleBehavior::UseAll => CandidateSet::new(self.destinations.clone()),
        }
    }
}

/// A logical upstream service.
pub struct Backend {
    id: String,
    snapshot: ArcSwap<BackendSnapshot>,
}

impl Backend {
    /// Build a backend from config. Fails if any policy id is unknown.
    pub fn from_config(config: &BackendConfig) -> Result<Self, Vec<ValidationError>> {
        let snapshot = resolve_snapshot(config, &[])?;
        Ok(Self {
            id: config.id.clone(),
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Load the current snapshot. Lock-free; the returned Arc stays
    /// consistent for the lifetime of the request holding it.
    pub fn snapshot(&self) -> Arc<BackendSnapshot> {
        self.snapshot.load_full()
    }

    /// Replace the snapshot with one resolved from new config.
    ///
    /// Destinations whose id, address, and weight are unchanged keep their
    /// entity (and with it health state and in-flight counts) across the
    /// update. On error nothing is stored and the old snapshot keeps serving.
    pub fn apply_config(&self, config: &BackendConfig) -> Result<(), Vec<ValidationError>> {
        let current = self.snapshot.load();
        let next = resolve_snapshot(config, &current.destinations)?;
        self.snapshot.store(Arc::new(next));
        Ok(())
    }

    /// Candidate set from the current snapshot. Pipelines that need the
    /// snapshot for anything else should load it once and call
    /// `BackendSnapshot::candidates` on it instead.
    pub fn candidates(&self) -> CandidateSet {
        self.snapshot.load().candidates()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").field("id", &self.id).finish()
    }
}

fn resolve_snapshot(
    config: &BackendConfig,
    existing: &[Arc<Destination>],
) -> Result<BackendSnapshot, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let policy = match balancer::resolve_policy(&config.load_balancing) {
        Some(p) => Some(p),
        None => {
            errors.push(ValidationError::UnknownLoadBalancingPolicy {
                backend: config.id.clone(),
                policy: config.load_balancing.clone(),
            });
            None
        }
    };

    let affinity = if config.affinity.enabled {
        match affinity::resolve_binding(&config.id, &config.affinity) {
            Ok(binding) => Some(binding),
            Err(mut errs) => {
                errors.append(&mut errs);
                None
            }
        }
    } else {
        None
    };

    let mut destinations = Vec::with_capacity(config.destinations.len());
    for dest_config in &config.destinations {
        let address: Url = match dest_config.address.parse() {
            Ok(url) => url,
            Err(e) => {
                errors.push(ValidationError::InvalidAddress {
                    backend: config.id.clone(),
                    address: dest_config.address.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let reused = existing.iter().find(|d| {
            d.id == dest_config.id && d.address == address && d.weight == dest_config.weight
        });
        match reused {
            Some(d) => destinations.push(d.clone()),
            None => destinations.push(Arc::new(Destination::new(
                dest_config.id.clone(),
                address,
                dest_config.weight,
            ))),
        }
    }

    let Some(policy) = policy else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(BackendSnapshot {
        config: config.clone(),
        policy,
        affinity,
        destinations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DestinationConfig;

    fn config(id: &str, destinations: &[&str]) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            load_balancing: "round-robin".to_string(),
            on_no_eligible: NoEligibleBehavior::Fail,
            health: Default::default(),
            affinity: Default::default(),
            destinations: destinations
                .iter()
                .enumerate()
                .map(|(i, id)| DestinationConfig {
                    id: id.to_string(),
                    address: format!("http://127.0.0.1:{}", 3000 + i),
                    weight: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn unknown_policy_refuses_update_and_keeps_old_snapshot() {
        let backend = Backend::from_config(&config("web", &["d1", "d2"])).unwrap();

        let mut bad = config("web", &["d1"]);
        bad.load_balancing = "no-such-policy".to_string();
        assert!(backend.apply_config(&bad).is_err());

        // Old snapshot still serving both destinations.
        assert_eq!(backend.snapshot().destinations.len(), 2);
    }

    #[test]
    fn unchanged_destinations_keep_identity_across_updates() {
        let backend = Backend::from_config(&config("web", &["d1", "d2"])).unwrap();
        let before = backend.snapshot().destinations[0].clone();
        before.record_probe_success(1);

        backend.apply_config(&config("web", &["d1", "d2"])).unwrap();
        let after = backend.snapshot().destinations[0].clone();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn unhealthy_destinations_are_filtered_from_candidates() {
        let backend = Backend::from_config(&config("web", &["d1", "d2"])).unwrap();
        let snapshot = backend.snapshot();
        for _ in 0..3 {
            snapshot.destinations[0].record_probe_failure(3);
        }

        let candidates = backend.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates.get(0).unwrap().id, "d2");
    }

    #[test]
    fn all_unhealthy_honors_explicit_fallback_choice() {
        let mut cfg = config("web", &["d1"]);
        cfg.on_no_eligible = NoEligibleBehavior::UseAll;
        let backend = Backend::from_config(&cfg).unwrap();
        for _ in 0..3 {
            backend.snapshot().destinations[0].record_probe_failure(3);
        }
        assert_eq!(backend.candidates().len(), 1);

        let backend = Backend::from_config(&config("web", &["d1"])).unwrap();
        for _ in 0..3 {
            backend.snapshot().destinations[0].record_probe_failure(3);
        }
        assert!(backend.candidates().is_empty());
    }
}
