//! Runtime topology: the arena of backends.
//!
//! # Responsibilities
//! - Own every Backend, addressed by stable id
//! - Apply topology updates (add/update/remove backends and destinations)
//! - Serve lock-free backend lookups to the request path
//!
//! # Design Decisions
//! - Mutation is funneled through `apply`, which the caller serializes;
//!   readers never block on it
//! - A backend whose new config fails resolution keeps its previous
//!   snapshot; the error propagates to the caller
//! - Destination add/remove is expressed as part of the owning backend's
//!   config and lands in one atomic snapshot swap

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;
use crate::model::backend::Backend;

/// Summary of what an `apply` changed, used to drive prober lifecycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TopologyChanges {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

/// The shared runtime model.
#[derive(Debug, Default)]
pub struct Topology {
    backends: DashMap<String, Arc<Backend>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a backend by id.
    pub fn backend(&self, id: &str) -> Option<Arc<Backend>> {
        self.backends.get(id).map(|entry| entry.value().clone())
    }

    /// Ids of all known backends.
    pub fn backend_ids(&self) -> Vec<String> {
        self.backends.iter().map(|e| e.key().clone()).collect()
    }

    /// Diff a full configuration into the arena.
    ///
    /// Must be called from a single updater at a time (the config watch
    /// loop); requests keep reading snapshots throughout.
    pub fn apply(&self, config: &ProxyConfig) -> Result<TopologyChanges, Vec<ValidationError>> {
        let mut changes = TopologyChanges::default();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for backend_config in &config.backends {
            seen.insert(backend_config.id.clone());

            match self.backends.get(&backend_config.id) {
                Some(existing) => {
                    let backend = existing.value().clone();
                    drop(existing);

                    let before: HashSet<String> = backend
                        .snapshot()
                        .destinations
                        .iter()
                        .map(|d| d.id.clone())
                        .collect();

                    match backend.apply_config(backend_config) {
                        Ok(()) => {
                            let after: HashSet<String> = backend
                                .snapshot()
                                .destinations
                                .iter()
                                .map(|d| d.id.clone())
                                .collect();
                            for id in after.difference(&before) {
                                tracing::info!(
                                    backend = %backend_config.id,
                                    destination = %id,
                                    "Destination added"
                                );
                            }
                            for id in before.difference(&after) {
                                tracing::info!(
                                    backend = %backend_config.id,
                                    destination = %id,
                                    "Destination removed"
                                );
                            }
                            changes.updated.push(backend_config.id.clone());
                        }
                        Err(mut errs) => {
                            tracing::warn!(
                                backend = %backend_config.id,
                                "Backend update refused, previous config stays active"
                            );
                            errors.append(&mut errs);
                        }
                    }
                }
                None => match Backend::from_config(backend_config) {
                    Ok(backend) => {
                        tracing::info!(
                            backend = %backend_config.id,
                            destinations = backend_config.destinations.len(),
                            "Backend added"
                        );
                        self.backends
                            .insert(backend_config.id.clone(), Arc::new(backend));
                        changes.added.push(backend_config.id.clone());
                    }
                    Err(mut errs) => errors.append(&mut errs),
                },
            }
        }

        let stale: Vec<String> = self
            .backends
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| !seen.contains(id))
            .collect();
        for id in stale {
            self.backends.remove(&id);
            tracing::info!(backend = %id, "Backend removed");
            changes.removed.push(id);
        }

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }
}
