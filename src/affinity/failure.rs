//! Affinity failure policies.
//!
//! Invoked when a request carried an affinity key that could not be used.
//! A policy either lets the pipeline continue over the full candidate set
//! or owns the outcome and stops the request before forwarding.

use std::sync::Arc;

use async_trait::async_trait;

use crate::affinity::AffinityFailure;

/// Recovery strategy for failed affinity resolution, bound per backend.
///
/// `handle` is async so a policy is free to consult external state before
/// deciding; the built-in policies decide synchronously.
#[async_trait]
pub trait AffinityFailurePolicy: Send + Sync {
    /// Get the policy id.
    fn name(&self) -> &'static str;

    /// Decide whether the pipeline keeps processing the request.
    /// `false` means this policy owns the outcome: the request is aborted
    /// with a distinct error and nothing is forwarded.
    async fn handle(&self, backend_id: &str, failure: AffinityFailure) -> bool;
}

/// Abort the request with a defined error.
pub struct FailRequest;

#[async_trait]
impl AffinityFailurePolicy for FailRequest {
    fn name(&self) -> &'static str {
        "fail"
    }

    async fn handle(&self, backend_id: &str, failure: AffinityFailure) -> bool {
        tracing::warn!(
            backend = %backend_id,
            failure = ?failure,
            "Affinity failure, aborting request"
        );
        false
    }
}

/// Drop the broken affinity and load-balance over the full candidate set.
/// A fresh affinity is established to whichever destination is chosen.
pub struct Redistribute;

#[async_trait]
impl AffinityFailurePolicy for Redistribute {
    fn name(&self) -> &'static str {
        "redistribute"
    }

    async fn handle(&self, backend_id: &str, failure: AffinityFailure) -> bool {
        tracing::debug!(
            backend = %backend_id,
            failure = ?failure,
            "Affinity failure, redistributing"
        );
        true
    }
}

/// Failure policy ids accepted in configuration.
pub const FAILURE_POLICY_IDS: &[&str] = &["redistribute", "fail"];

/// Resolve a failure policy id into its strategy object.
pub fn resolve_failure_policy(id: &str) -> Option<Arc<dyn AffinityFailurePolicy>> {
    match id {
        "fail" => Some(Arc::new(FailRequest)),
        "redistribute" => Some(Arc::new(Redistribute)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_policy_stops_the_pipeline() {
        let policy = resolve_failure_policy("fail").unwrap();
        assert!(!policy.handle("web", AffinityFailure::DestinationNotFound).await);
    }

    #[tokio::test]
    async fn redistribute_policy_continues() {
        let policy = resolve_failure_policy("redistribute").unwrap();
        assert!(policy.handle("web", AffinityFailure::KeyExtractionFailed).await);
    }

    #[test]
    fn unknown_ids_do_not_resolve() {
        assert!(resolve_failure_policy("shrug").is_none());
    }
}
