//! Session affinity subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers
//!     → bound provider (cookie.rs / header.rs / custom.rs)
//!         key absent      → KeyNotSet (proceed unaffinitized)
//!         key unusable    → Failed(KeyExtractionFailed)
//!         target missing  → Failed(DestinationNotFound)
//!         key resolves    → Affinitized (candidates narrowed to one)
//!     → on failure: bound failure policy (failure.rs) decides whether
//!       the pipeline continues over the full set or stops
//!
//! Response path:
//!     newly balanced destination → provider.establish()
//!     → response mutations (set-cookie / header) applied after forwarding
//! ```
//!
//! # Design Decisions
//! - Providers and failure policies are resolved from their string ids
//!   once per topology update and bound with their options
//! - A duplicated key (repeated header, repeated cookie) is an extraction
//!   failure, never a best-effort pick
//! - Key material on the wire is an encoded destination id, optionally
//!   HMAC-signed (key.rs); a failed signature is an extraction failure

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::AffinityConfig;
use crate::config::validation::ValidationError;
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

pub mod cookie;
pub mod custom;
pub mod failure;
pub mod header;
pub mod key;

pub use cookie::CookieAffinity;
pub use custom::CustomKeyAffinity;
pub use failure::{AffinityFailurePolicy, FailRequest, Redistribute};
pub use header::HeaderAffinity;
pub use key::KeyCodec;

/// Why affinity resolution failed for a request that carried a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityFailure {
    /// Key present but malformed, duplicated, or failing verification.
    KeyExtractionFailed,
    /// Key resolved to a destination that is not among the candidates.
    DestinationNotFound,
}

/// Outcome of affinity resolution for one request.
#[derive(Debug, Clone)]
pub enum AffinityResult {
    /// Key resolved; the candidate set is narrowed to that destination.
    Affinitized(CandidateSet),
    /// No key on the request. Not an error; proceed unaffinitized.
    KeyNotSet,
    /// Key present but unusable; the failure policy decides what happens.
    Failed(AffinityFailure),
}

/// Response-side changes the engine wants applied by the forwarding layer.
#[derive(Debug, Default, Clone)]
pub struct ResponseMutations {
    /// Headers to set on the response.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Set-Cookie values to append.
    pub set_cookies: Vec<String>,
}

impl ResponseMutations {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.set_cookies.is_empty()
    }
}

/// A session affinity mode bound to one backend's options.
pub trait AffinityProvider: Send + Sync {
    /// Get the mode id.
    fn mode(&self) -> &'static str;

    /// Extract the affinity key and narrow the candidates accordingly.
    fn resolve(&self, headers: &HeaderMap, candidates: &CandidateSet) -> AffinityResult;

    /// Record affinity to the chosen destination on the response, so the
    /// client's next request carries the key.
    fn establish(&self, destination: &Destination, mutations: &mut ResponseMutations);
}

/// A backend's resolved affinity machinery: provider plus failure policy.
#[derive(Clone)]
pub struct AffinityBinding {
    pub provider: Arc<dyn AffinityProvider>,
    pub failure_policy: Arc<dyn AffinityFailurePolicy>,
}

/// Mode ids accepted in configuration.
pub const MODE_IDS: &[&str] = &["cookie", "header", "custom-key"];

/// Whether an affinity mode id is recognized.
pub fn is_known_mode(id: &str) -> bool {
    MODE_IDS.contains(&id)
}

/// Whether a failure policy id is recognized.
pub fn is_known_failure_policy(id: &str) -> bool {
    failure::FAILURE_POLICY_IDS.contains(&id)
}

/// Resolve a backend's affinity options into bound strategy objects.
pub fn resolve_binding(
    backend_id: &str,
    config: &AffinityConfig,
) -> Result<AffinityBinding, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let codec = KeyCodec::new(config.protection, config.secret.as_bytes());
    let provider: Option<Arc<dyn AffinityProvider>> = match config.mode.as_str() {
        "cookie" => Some(Arc::new(CookieAffinity::new(&config.key_name, codec))),
        "header" => Some(Arc::new(HeaderAffinity::new(&config.key_name, codec))),
        "custom-key" => Some(Arc::new(CustomKeyAffinity::new(&config.key_name))),
        other => {
            errors.push(ValidationError::UnknownAffinityMode {
                backend: backend_id.to_string(),
                mode: other.to_string(),
            });
            None
        }
    };

    let failure_policy = match failure::resolve_failure_policy(&config.failure_policy) {
        Some(p) => Some(p),
        None => {
            errors.push(ValidationError::UnknownAffinityFailurePolicy {
                backend: backend_id.to_string(),
                policy: config.failure_policy.clone(),
            });
            None
        }
    };

    match (provider, failure_policy) {
        (Some(provider), Some(failure_policy)) if errors.is_empty() => Ok(AffinityBinding {
            provider,
            failure_policy,
        }),
        _ => Err(errors),
    }
}
