//! Per-request decision pipeline and the Director facade.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::affinity::{AffinityResult, ResponseMutations};
use crate::balancer;
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;
use crate::error::{ConfigError, DispatchError};
use crate::health::{ProbeTransport, ProberSet};
use crate::model::destination::{Destination, InFlightGuard};
use crate::model::topology::{Topology, TopologyChanges};
use crate::observability::metrics;

/// A completed decision, handed to the forwarding layer.
///
/// Dropping it releases the destination's in-flight slot, whether the
/// request finished, failed, or was cancelled.
#[derive(Debug)]
pub struct Dispatch {
    guard: InFlightGuard,
    mutations: ResponseMutations,
}

impl Dispatch {
    /// The chosen destination.
    pub fn destination(&self) -> &Destination {
        &self.guard
    }

    /// Response-side changes to apply (affinity establishment).
    pub fn mutations(&self) -> &ResponseMutations {
        &self.mutations
    }
}

/// The decision engine: owns the topology and the prober lifecycle,
/// and runs the per-request pipeline.
pub struct Director {
    topology: Arc<Topology>,
    probers: ProberSet,
}

impl Director {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            topology: Arc::new(Topology::new()),
            probers: ProberSet::new(transport),
        }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Apply a configuration to the runtime model and sync prober tasks.
    ///
    /// The config is validated first; a config referencing unknown policy
    /// ids is refused wholesale and the previous topology keeps serving.
    /// Callers must serialize invocations (the config watch loop does).
    pub async fn apply_config(&self, config: &ProxyConfig) -> Result<TopologyChanges, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let changes = self.topology.apply(config).map_err(ConfigError::Validation)?;

        for id in &changes.added {
            if let Some(backend) = self.topology.backend(id) {
                self.probers.ensure(&backend);
            }
        }
        for id in &changes.removed {
            self.probers.remove(id).await;
        }

        Ok(changes)
    }

    /// Stop all background work (process shutdown).
    pub async fn shutdown(&self) {
        self.probers.shutdown_all().await;
    }

    /// Decide where one request goes.
    ///
    /// Stages: build the health-filtered candidate snapshot; narrow it by
    /// session affinity (skipped when disabled); let the affinity failure
    /// policy arbitrate broken affinity; load-balance what is left. The
    /// whole decision works off one backend snapshot, so a concurrent
    /// topology update is either fully visible or not at all.
    pub async fn dispatch(
        &self,
        backend_id: &str,
        headers: &HeaderMap,
    ) -> Result<Dispatch, DispatchError> {
        let backend = self
            .topology
            .backend(backend_id)
            .ok_or_else(|| DispatchError::BackendNotFound(backend_id.to_string()))?;
        let snapshot = backend.snapshot();

        let mut candidates = snapshot.candidates();
        let mut mutations = ResponseMutations::default();
        let mut affinitized = false;

        if let Some(binding) = &snapshot.affinity {
            match binding.provider.resolve(headers, &candidates) {
                AffinityResult::Affinitized(narrowed) => {
                    candidates = narrowed;
                    affinitized = true;
                }
                AffinityResult::KeyNotSet => {}
                AffinityResult::Failed(failure) => {
                    let proceed = binding.failure_policy.handle(backend_id, failure).await;
                    metrics::record_affinity_failure(backend_id, failure, proceed);
                    if !proceed {
                        return Err(DispatchError::AffinityRejected(backend_id.to_string()));
                    }
                    // Redistribute: keep the full health-filtered set.
                }
            }
        }

        let destination = match balancer::select(snapshot.policy.as_ref(), &candidates) {
            Ok(destination) => destination,
            Err(_) => {
                tracing::warn!(backend = %backend_id, "No available destination");
                metrics::record_no_available_destination(backend_id);
                return Err(DispatchError::NoAvailableDestination(backend_id.to_string()));
            }
        };

        if let Some(binding) = &snapshot.affinity {
            if !affinitized {
                binding.provider.establish(&destination, &mut mutations);
            }
        }

        tracing::debug!(
            backend = %backend_id,
            destination = %destination.id,
            policy = snapshot.policy.name(),
            affinitized,
            "Request dispatched"
        );

        Ok(Dispatch {
            guard: destination.begin_request(),
            mutations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::KeyCodec;
    use crate::config::schema::{
        AffinityConfig, BackendConfig, DestinationConfig, HealthCheckConfig, KeyProtection,
    };
    use crate::health::{HttpProbeTransport, ProbeOutcome};
    use async_trait::async_trait;
    use axum::http::header::COOKIE;
    use std::time::Duration;
    use url::Url;

    struct NeverProbe;

    #[async_trait]
    impl crate::health::ProbeTransport for NeverProbe {
        async fn probe(&self, _target: &Url, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome::Success
        }
    }

    fn backend_config(id: &str, destinations: usize, affinity: AffinityConfig) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            load_balancing: "round-robin".to_string(),
            on_no_eligible: Default::default(),
            health: HealthCheckConfig {
                enabled: false,
                ..Default::default()
            },
            affinity,
            destinations: (0..destinations)
                .map(|i| DestinationConfig {
                    id: format!("d{i}"),
                    address: format!("http://127.0.0.1:{}", 3000 + i),
                    weight: 1,
                })
                .collect(),
        }
    }

    fn sticky_config(failure_policy: &str) -> AffinityConfig {
        AffinityConfig {
            enabled: true,
            mode: "cookie".to_string(),
            failure_policy: failure_policy.to_string(),
            key_name: "sticky".to_string(),
            protection: KeyProtection::Plain,
            secret: String::new(),
        }
    }

    async fn director_with(backends: Vec<BackendConfig>) -> Director {
        let director = Director::new(Arc::new(NeverProbe));
        let config = ProxyConfig {
            backends,
            ..Default::default()
        };
        director.apply_config(&config).await.unwrap();
        director
    }

    fn cookie_for(destination_id: &str) -> HeaderMap {
        let encoded = KeyCodec::new(KeyProtection::Plain, b"").encode(destination_id);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("sticky={encoded}").parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn unknown_backend_is_not_found() {
        let director = director_with(vec![]).await;
        assert!(matches!(
            director.dispatch("nope", &HeaderMap::new()).await,
            Err(DispatchError::BackendNotFound(_))
        ));
        director.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_without_affinity_rotates() {
        let director =
            director_with(vec![backend_config("web", 2, AffinityConfig::default())]).await;

        let first = director.dispatch("web", &HeaderMap::new()).await.unwrap();
        let second = director.dispatch("web", &HeaderMap::new()).await.unwrap();
        assert_ne!(first.destination().id, second.destination().id);
        director.shutdown().await;
    }

    #[tokio::test]
    async fn valid_affinity_key_always_wins() {
        let director =
            director_with(vec![backend_config("web", 3, sticky_config("redistribute"))]).await;

        let headers = cookie_for("d1");
        for _ in 0..10 {
            let dispatch = director.dispatch("web", &headers).await.unwrap();
            assert_eq!(dispatch.destination().id, "d1");
            // Already affinitized; nothing to re-establish.
            assert!(dispatch.mutations().is_empty());
        }
        director.shutdown().await;
    }

    #[tokio::test]
    async fn unaffinitized_request_gets_affinity_established() {
        let director =
            director_with(vec![backend_config("web", 2, sticky_config("redistribute"))]).await;

        let dispatch = director.dispatch("web", &HeaderMap::new()).await.unwrap();
        assert_eq!(dispatch.mutations().set_cookies.len(), 1);
        director.shutdown().await;
    }

    #[tokio::test]
    async fn missing_destination_redistributes_over_the_rest() {
        let director =
            director_with(vec![backend_config("web", 2, sticky_config("redistribute"))]).await;

        let headers = cookie_for("gone");
        let dispatch = director.dispatch("web", &headers).await.unwrap();
        assert!(["d0", "d1"].contains(&dispatch.destination().id.as_str()));
        // Redistribution re-establishes affinity to the new destination.
        assert_eq!(dispatch.mutations().set_cookies.len(), 1);
        director.shutdown().await;
    }

    #[tokio::test]
    async fn missing_destination_aborts_under_fail_policy() {
        let director = director_with(vec![backend_config("web", 2, sticky_config("fail"))]).await;

        let headers = cookie_for("gone");
        assert!(matches!(
            director.dispatch("web", &headers).await,
            Err(DispatchError::AffinityRejected(_))
        ));
        director.shutdown().await;
    }

    #[tokio::test]
    async fn affinity_disabled_ignores_the_key_entirely() {
        let director =
            director_with(vec![backend_config("web", 2, AffinityConfig::default())]).await;

        // Same key on both requests; rotation still moves.
        let headers = cookie_for("d0");
        let first = director.dispatch("web", &headers).await.unwrap();
        let second = director.dispatch("web", &headers).await.unwrap();
        assert_ne!(first.destination().id, second.destination().id);
        director.shutdown().await;
    }

    #[tokio::test]
    async fn empty_backend_reports_no_available_destination() {
        let director =
            director_with(vec![backend_config("web", 0, AffinityConfig::default())]).await;

        assert!(matches!(
            director.dispatch("web", &HeaderMap::new()).await,
            Err(DispatchError::NoAvailableDestination(_))
        ));
        director.shutdown().await;
    }

    #[tokio::test]
    async fn in_flight_counts_follow_dispatch_lifetime() {
        let director =
            director_with(vec![backend_config("web", 1, AffinityConfig::default())]).await;

        let dispatch = director.dispatch("web", &HeaderMap::new()).await.unwrap();
        let destination = director
            .topology()
            .backend("web")
            .unwrap()
            .candidates()
            .get(0)
            .unwrap()
            .clone();
        assert_eq!(destination.in_flight(), 1);
        drop(dispatch);
        assert_eq!(destination.in_flight(), 0);
        director.shutdown().await;
    }

    #[tokio::test]
    async fn reload_with_unknown_policy_is_refused() {
        let director =
            director_with(vec![backend_config("web", 2, AffinityConfig::default())]).await;

        let mut bad = backend_config("web", 1, AffinityConfig::default());
        bad.load_balancing = "no-such-policy".to_string();
        let config = ProxyConfig {
            backends: vec![bad],
            ..Default::default()
        };
        assert!(director.apply_config(&config).await.is_err());

        // Previous topology still serves both destinations.
        assert_eq!(
            director.topology().backend("web").unwrap().candidates().len(),
            2
        );
        director.shutdown().await;
    }

    #[tokio::test]
    async fn http_transport_is_the_default_wiring() {
        // Constructing the production transport must not require a runtime
        // beyond the ambient one.
        let _ = Director::new(Arc::new(HttpProbeTransport::new()));
    }
}
