//! Active health probing.
//!
//! # Responsibilities
//! - Run one background probe loop per backend
//! - Probe destinations concurrently, bounded per backend
//! - Fold results into per-destination hysteresis; log only transitions
//! - Stop gracefully when a backend is removed, bounded by a grace period

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::schema::HealthCheckConfig;
use crate::health::transport::{ProbeOutcome, ProbeTransport};
use crate::lifecycle::{join_within, Shutdown};
use crate::model::backend::{Backend, BackendSnapshot};
use crate::model::destination::Destination;
use crate::observability::metrics;

/// How long a stopping prober may keep running before it is aborted.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// How often a disabled prober re-checks its config.
const DISABLED_POLL: Duration = Duration::from_secs(1);

/// Background probe loop for one backend.
///
/// The loop re-reads the backend snapshot every cycle, so interval, path,
/// and threshold changes take effect in place without a restart.
pub struct Prober {
    backend: Arc<Backend>,
    transport: Arc<dyn ProbeTransport>,
}

impl Prober {
    pub fn new(backend: Arc<Backend>, transport: Arc<dyn ProbeTransport>) -> Self {
        Self { backend, transport }
    }

    /// Run until the shutdown signal fires. Probes the current snapshot
    /// first, then sleeps the configured interval between cycles; shutdown
    /// is only observed at cycle boundaries, so an in-flight cycle finishes.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(backend = %self.backend.id(), "Prober started");

        loop {
            let snapshot = self.backend.snapshot();
            let health = snapshot.config.health.clone();

            if !health.enabled {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(DISABLED_POLL) => continue,
                }
            }

            self.run_cycle(&snapshot, &health).await;

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(Duration::from_millis(health.interval_ms)) => {}
            }
        }

        tracing::info!(backend = %self.backend.id(), "Prober stopped");
    }

    /// Probe every destination in the snapshot once.
    async fn run_cycle(&self, snapshot: &BackendSnapshot, health: &HealthCheckConfig) {
        let timeout = Duration::from_millis(health.timeout_ms);
        let concurrency = health.max_concurrent_probes.max(1);

        let results = stream::iter(snapshot.destinations.iter().cloned())
            .map(|destination| {
                let transport = self.transport.clone();
                let path = health.path.clone();
                async move {
                    let outcome = Self::probe_one(transport, &destination, &path, timeout).await;
                    (destination, outcome)
                }
            })
            .buffer_unordered(concurrency);

        futures_util::pin_mut!(results);
        while let Some((destination, outcome)) = results.next().await {
            self.apply_outcome(&destination, outcome, health);
        }
    }

    /// Run a single probe in its own task so a panicking transport is
    /// contained and logged instead of killing the loop.
    async fn probe_one(
        transport: Arc<dyn ProbeTransport>,
        destination: &Arc<Destination>,
        path: &str,
        timeout: Duration,
    ) -> ProbeOutcome {
        let target: Url = match destination.address.join(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(
                    destination = %destination.id,
                    error = %e,
                    "Invalid probe target"
                );
                return ProbeOutcome::Failure;
            }
        };

        let task = tokio::spawn(async move { transport.probe(&target, timeout).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    destination = %destination.id,
                    error = %e,
                    "Probe task failed"
                );
                ProbeOutcome::Failure
            }
        }
    }

    fn apply_outcome(
        &self,
        destination: &Arc<Destination>,
        outcome: ProbeOutcome,
        health: &HealthCheckConfig,
    ) {
        tracing::debug!(
            backend = %self.backend.id(),
            destination = %destination.id,
            outcome = ?outcome,
            "Probe result"
        );

        let transition = match outcome {
            ProbeOutcome::Success => destination.record_probe_success(health.healthy_threshold),
            ProbeOutcome::Failure | ProbeOutcome::Timeout => {
                destination.record_probe_failure(health.unhealthy_threshold)
            }
        };

        if let Some(transition) = transition {
            tracing::info!(
                backend = %self.backend.id(),
                destination = %destination.id,
                from = ?transition.from,
                to = ?transition.to,
                "Destination health changed"
            );
            metrics::record_destination_health(self.backend.id(), destination);
        }
    }
}

struct ProberHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// Owns the prober task for every backend in the topology.
pub struct ProberSet {
    transport: Arc<dyn ProbeTransport>,
    grace: Duration,
    probers: DashMap<String, ProberHandle>,
}

impl ProberSet {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            grace: STOP_GRACE,
            probers: DashMap::new(),
        }
    }

    /// Override the stop grace period (tests).
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Spawn a prober for the backend unless one is already running.
    pub fn ensure(&self, backend: &Arc<Backend>) {
        if self.probers.contains_key(backend.id()) {
            return;
        }

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        let prober = Prober::new(backend.clone(), self.transport.clone());
        let task = tokio::spawn(prober.run(receiver));

        self.probers
            .insert(backend.id().to_string(), ProberHandle { shutdown, task });
    }

    /// Stop and discard the prober for a removed backend. Waits out the
    /// grace period, then aborts.
    pub async fn remove(&self, backend_id: &str) {
        let Some((_, handle)) = self.probers.remove(backend_id) else {
            return;
        };
        handle.shutdown.trigger();
        if !join_within(handle.task, self.grace).await {
            tracing::warn!(backend = %backend_id, "Prober aborted after grace period");
        }
    }

    /// Stop every prober (process shutdown).
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.probers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.remove(&id).await;
        }
    }

    /// Number of running probers.
    pub fn len(&self) -> usize {
        self.probers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BackendConfig, DestinationConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that fails a fixed number of times, then succeeds.
    struct FlakyTransport {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl ProbeTransport for FlakyTransport {
        async fn probe(&self, _target: &Url, _timeout: Duration) -> ProbeOutcome {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                ProbeOutcome::Failure
            } else {
                ProbeOutcome::Success
            }
        }
    }

    fn backend(interval_ms: u64) -> Arc<Backend> {
        let config = BackendConfig {
            id: "web".to_string(),
            load_balancing: "round-robin".to_string(),
            on_no_eligible: Default::default(),
            health: HealthCheckConfig {
                enabled: true,
                interval_ms,
                timeout_ms: 100,
                path: "/health".to_string(),
                unhealthy_threshold: 2,
                healthy_threshold: 1,
                max_concurrent_probes: 4,
            },
            affinity: Default::default(),
            destinations: vec![DestinationConfig {
                id: "d1".to_string(),
                address: "http://127.0.0.1:3000".to_string(),
                weight: 1,
            }],
        };
        Arc::new(Backend::from_config(&config).unwrap())
    }

    #[tokio::test]
    async fn prober_applies_hysteresis_over_cycles() {
        let backend = backend(10);
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicUsize::new(2),
        });
        let set = ProberSet::new(transport).with_grace(Duration::from_millis(200));
        set.ensure(&backend);

        let destination = backend.snapshot().destinations[0].clone();

        // Two failures push it unhealthy, then the first success heals it
        // (healthy_threshold = 1).
        tokio::time::timeout(Duration::from_secs(5), async {
            while destination.is_eligible() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("destination should go unhealthy");

        tokio::time::timeout(Duration::from_secs(5), async {
            while !destination.is_eligible() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("destination should recover");

        set.shutdown_all().await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn remove_stops_the_prober_within_grace() {
        let backend = backend(3_600_000);
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicUsize::new(0),
        });
        let set = ProberSet::new(transport).with_grace(Duration::from_millis(200));
        set.ensure(&backend);
        assert_eq!(set.len(), 1);

        set.remove("web").await;
        assert!(set.is_empty());
        // Removing an unknown backend is a no-op.
        set.remove("web").await;
    }
}
