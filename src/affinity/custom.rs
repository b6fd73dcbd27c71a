//! Custom-key session affinity.
//!
//! Instead of carrying a destination id, the client sends an arbitrary
//! stable key (a user id, a tenant id) in a configured header; the key is
//! hashed onto the candidate list. No response state is needed: the same
//! key maps to the same destination while the candidate list is stable.

use std::hash::{DefaultHasher, Hash, Hasher};

use axum::http::{HeaderMap, HeaderName};

use crate::affinity::{AffinityFailure, AffinityProvider, AffinityResult, ResponseMutations};
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Affinity keyed by an arbitrary caller-provided value, hash-mapped onto
/// the candidate set.
pub struct CustomKeyAffinity {
    header_name: HeaderName,
}

impl CustomKeyAffinity {
    pub fn new(header_name: &str) -> Self {
        Self {
            header_name: HeaderName::from_bytes(header_name.as_bytes())
                .unwrap_or(HeaderName::from_static("x-affinity-key")),
        }
    }
}

impl AffinityProvider for CustomKeyAffinity {
    fn mode(&self) -> &'static str {
        "custom-key"
    }

    fn resolve(&self, headers: &HeaderMap, candidates: &CandidateSet) -> AffinityResult {
        let mut values = headers.get_all(&self.header_name).iter();
        let value = match (values.next(), values.next()) {
            (None, _) => return AffinityResult::KeyNotSet,
            (Some(_), Some(_)) => {
                return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed)
            }
            (Some(single), None) => single,
        };
        let Ok(key) = value.to_str() else {
            return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed);
        };

        if candidates.is_empty() {
            return AffinityResult::Failed(AffinityFailure::DestinationNotFound);
        }

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % candidates.len();

        match candidates.get(index) {
            Some(destination) => match candidates.narrow_to(&destination.id) {
                Some(narrowed) => AffinityResult::Affinitized(narrowed),
                None => AffinityResult::Failed(AffinityFailure::DestinationNotFound),
            },
            None => AffinityResult::Failed(AffinityFailure::DestinationNotFound),
        }
    }

    fn establish(&self, _destination: &Destination, _mutations: &mut ResponseMutations) {
        // The client owns the key; there is nothing to persist.
    }
}
