//! Header-based session affinity.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::affinity::key::KeyCodec;
use crate::affinity::{AffinityFailure, AffinityProvider, AffinityResult, ResponseMutations};
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Affinity keyed by a named request header carrying an encoded
/// destination id. The same header is echoed on the response when
/// affinity is established.
pub struct HeaderAffinity {
    header_name: HeaderName,
    codec: KeyCodec,
}

impl HeaderAffinity {
    pub fn new(header_name: &str, codec: KeyCodec) -> Self {
        Self {
            header_name: HeaderName::from_bytes(header_name.as_bytes())
                .unwrap_or(HeaderName::from_static("x-affinity-key")),
            codec,
        }
    }
}

impl AffinityProvider for HeaderAffinity {
    fn mode(&self) -> &'static str {
        "header"
    }

    fn resolve(&self, headers: &HeaderMap, candidates: &CandidateSet) -> AffinityResult {
        let mut values = headers.get_all(&self.header_name).iter();
        let value = match (values.next(), values.next()) {
            (None, _) => return AffinityResult::KeyNotSet,
            // A repeated header is ambiguous; report it rather than
            // guessing which copy to trust.
            (Some(_), Some(_)) => {
                return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed)
            }
            (Some(single), None) => single,
        };

        let Ok(value) = value.to_str() else {
            return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed);
        };

        let destination_id = match self.codec.decode(value) {
            Ok(id) => id,
            Err(_) => return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed),
        };

        match candidates.narrow_to(&destination_id) {
            Some(narrowed) => AffinityResult::Affinitized(narrowed),
            None => AffinityResult::Failed(AffinityFailure::DestinationNotFound),
        }
    }

    fn establish(&self, destination: &Destination, mutations: &mut ResponseMutations) {
        let encoded = self.codec.encode(&destination.id);
        if let Ok(value) = HeaderValue::from_str(&encoded) {
            mutations.headers.push((self.header_name.clone(), value));
        }
    }
}
