//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Reject unknown policy ids before they reach the runtime model
//! - Validate value ranges (thresholds >= 1, intervals > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Runs before a config is accepted into the system, so a bad reload
//!   can be refused while the previous topology keeps serving

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::affinity;
use crate::balancer;
use crate::config::schema::{KeyProtection, ProxyConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate backend id '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{backend}': duplicate destination id '{destination}'")]
    DuplicateDestination { backend: String, destination: String },

    #[error("backend '{backend}': invalid destination address '{address}': {reason}")]
    InvalidAddress {
        backend: String,
        address: String,
        reason: String,
    },

    #[error("backend '{backend}': unknown load balancing policy '{policy}'")]
    UnknownLoadBalancingPolicy { backend: String, policy: String },

    #[error("backend '{backend}': unknown affinity mode '{mode}'")]
    UnknownAffinityMode { backend: String, mode: String },

    #[error("backend '{backend}': unknown affinity failure policy '{policy}'")]
    UnknownAffinityFailurePolicy { backend: String, policy: String },

    #[error("backend '{backend}': signed affinity keys require a non-empty secret")]
    MissingAffinitySecret { backend: String },

    #[error("backend '{backend}': destination weight must be at least 1")]
    ZeroWeight { backend: String },

    #[error("backend '{backend}': health thresholds must be at least 1")]
    ZeroThreshold { backend: String },

    #[error("backend '{backend}': health interval must be greater than zero")]
    ZeroInterval { backend: String },

    #[error("route '{route}' references unknown backend '{backend}'")]
    UnknownRouteBackend { route: String, backend: String },
}

/// Validate a configuration, collecting every semantic error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut backend_ids = HashSet::new();

    for backend in &config.backends {
        if !backend_ids.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.id.clone()));
        }

        if !balancer::is_known_policy(&backend.load_balancing) {
            errors.push(ValidationError::UnknownLoadBalancingPolicy {
                backend: backend.id.clone(),
                policy: backend.load_balancing.clone(),
            });
        }

        let mut destination_ids = HashSet::new();
        for destination in &backend.destinations {
            if !destination_ids.insert(destination.id.as_str()) {
                errors.push(ValidationError::DuplicateDestination {
                    backend: backend.id.clone(),
                    destination: destination.id.clone(),
                });
            }
            if let Err(e) = Url::parse(&destination.address) {
                errors.push(ValidationError::InvalidAddress {
                    backend: backend.id.clone(),
                    address: destination.address.clone(),
                    reason: e.to_string(),
                });
            }
            if destination.weight == 0 {
                errors.push(ValidationError::ZeroWeight {
                    backend: backend.id.clone(),
                });
            }
        }

        if backend.health.healthy_threshold == 0 || backend.health.unhealthy_threshold == 0 {
            errors.push(ValidationError::ZeroThreshold {
                backend: backend.id.clone(),
            });
        }
        if backend.health.enabled && backend.health.interval_ms == 0 {
            errors.push(ValidationError::ZeroInterval {
                backend: backend.id.clone(),
            });
        }

        if backend.affinity.enabled {
            if !affinity::is_known_mode(&backend.affinity.mode) {
                errors.push(ValidationError::UnknownAffinityMode {
                    backend: backend.id.clone(),
                    mode: backend.affinity.mode.clone(),
                });
            }
            if !affinity::is_known_failure_policy(&backend.affinity.failure_policy) {
                errors.push(ValidationError::UnknownAffinityFailurePolicy {
                    backend: backend.id.clone(),
                    policy: backend.affinity.failure_policy.clone(),
                });
            }
            if backend.affinity.protection == KeyProtection::Signed
                && backend.affinity.secret.is_empty()
            {
                errors.push(ValidationError::MissingAffinitySecret {
                    backend: backend.id.clone(),
                });
            }
        }
    }

    for route in &config.routes {
        if !backend_ids.contains(route.backend.as_str()) {
            errors.push(ValidationError::UnknownRouteBackend {
                route: route.name.clone(),
                backend: route.backend.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AffinityConfig, BackendConfig, DestinationConfig, RouteConfig};

    fn backend(id: &str) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            load_balancing: "round-robin".to_string(),
            on_no_eligible: Default::default(),
            health: Default::default(),
            affinity: Default::default(),
            destinations: vec![DestinationConfig {
                id: "d1".to_string(),
                address: "http://127.0.0.1:3000".to_string(),
                weight: 1,
            }],
        }
    }

    #[test]
    fn accepts_minimal_valid_config() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("web"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_unknown_policy_ids() {
        let mut config = ProxyConfig::default();
        let mut b = backend("web");
        b.load_balancing = "fastest-ever".to_string();
        b.affinity = AffinityConfig {
            enabled: true,
            mode: "telepathy".to_string(),
            failure_policy: "shrug".to_string(),
            ..Default::default()
        };
        config.backends.push(b);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownLoadBalancingPolicy { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownAffinityMode { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownAffinityFailurePolicy { .. })));
    }

    #[test]
    fn rejects_duplicate_and_dangling_ids() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("web"));
        config.backends.push(backend("web"));
        config.routes.push(RouteConfig {
            name: "r1".to_string(),
            host: None,
            path_prefix: Some("/".to_string()),
            backend: "missing".to_string(),
            priority: 0,
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateBackend(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownRouteBackend { .. })));
    }

    #[test]
    fn signed_affinity_requires_secret() {
        let mut config = ProxyConfig::default();
        let mut b = backend("web");
        b.affinity = AffinityConfig {
            enabled: true,
            protection: KeyProtection::Signed,
            ..Default::default()
        };
        config.backends.push(b);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MissingAffinitySecret { .. })));
    }
}
