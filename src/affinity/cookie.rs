//! Cookie-based session affinity.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

use crate::affinity::key::KeyCodec;
use crate::affinity::{AffinityFailure, AffinityProvider, AffinityResult, ResponseMutations};
use crate::model::candidates::CandidateSet;
use crate::model::destination::Destination;

/// Affinity keyed by a named cookie carrying an encoded destination id.
pub struct CookieAffinity {
    cookie_name: String,
    codec: KeyCodec,
}

impl CookieAffinity {
    pub fn new(cookie_name: impl Into<String>, codec: KeyCodec) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            codec,
        }
    }

    /// Collect every value for our cookie across all Cookie headers.
    fn cookie_values<'a>(&self, headers: &'a HeaderMap) -> Vec<&'a str> {
        let mut values = Vec::new();
        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            for pair in raw.split(';') {
                let pair = pair.trim();
                if let Some((name, value)) = pair.split_once('=') {
                    if name.trim() == self.cookie_name {
                        values.push(value.trim());
                    }
                }
            }
        }
        values
    }
}

impl AffinityProvider for CookieAffinity {
    fn mode(&self) -> &'static str {
        "cookie"
    }

    fn resolve(&self, headers: &HeaderMap, candidates: &CandidateSet) -> AffinityResult {
        let values = self.cookie_values(headers);
        let value = match values.as_slice() {
            [] => return AffinityResult::KeyNotSet,
            [single] => *single,
            // The same cookie appearing twice is ambiguous; report it
            // rather than guessing which copy to trust.
            _ => return AffinityResult::Failed(AffinityFailure::KeyExtractionFailed),
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
        mutations.set_cookies.push(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            self.codec.encode(&destination.id)
        ));
    }
}
