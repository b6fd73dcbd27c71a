//! Affinity key encoding and verification.
//!
//! # Responsibilities
//! - Encode a destination id into a value safe to carry in a cookie/header
//! - Decode and, for signed keys, verify what the client sent back
//!
//! # Design Decisions
//! - Plain mode is url-safe base64; it protects against nothing, only
//!   keeps ids cookie-safe
//! - Signed mode appends an HMAC-SHA256 tag; a wrong or stripped tag is
//!   rejected before the id is looked up

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::schema::KeyProtection;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a received key failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyDecodeError {
    #[error("malformed affinity key")]
    Malformed,
    #[error("affinity key signature mismatch")]
    BadSignature,
}

/// Encodes and decodes affinity keys per the backend's protection options.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    protection: KeyProtection,
    secret: Vec<u8>,
}

impl KeyCodec {
    pub fn new(protection: KeyProtection, secret: &[u8]) -> Self {
        Self {
            protection,
            secret: secret.to_vec(),
        }
    }

    /// Encode a destination id for the wire.
    pub fn encode(&self, destination_id: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(destination_id.as_bytes());
        match self.protection {
            KeyProtection::Plain => payload,
            KeyProtection::Signed => {
                let tag = URL_SAFE_NO_PAD.encode(self.tag(destination_id.as_bytes()));
                format!("{payload}.{tag}")
            }
        }
    }

    /// Decode a received value back into a destination id.
    pub fn decode(&self, value: &str) -> Result<String, KeyDecodeError> {
        match self.protection {
            KeyProtection::Plain => {
                let bytes = URL_SAFE_NO_PAD
                    .decode(value)
                    .map_err(|_| KeyDecodeError::Malformed)?;
                String::from_utf8(bytes).map_err(|_| KeyDecodeError::Malformed)
            }
            KeyProtection::Signed => {
                let (payload, tag) = value.split_once('.').ok_or(KeyDecodeError::Malformed)?;
                let id_bytes = URL_SAFE_NO_PAD
                    .decode(payload)
                    .map_err(|_| KeyDecodeError::Malformed)?;
                let tag_bytes = URL_SAFE_NO_PAD
                    .decode(tag)
                    .map_err(|_| KeyDecodeError::Malformed)?;

                let mut mac = self.mac();
                mac.update(&id_bytes);
                mac.verify_slice(&tag_bytes)
                    .map_err(|_| KeyDecodeError::BadSignature)?;

                String::from_utf8(id_bytes).map_err(|_| KeyDecodeError::Malformed)
            }
        }
    }

    fn tag(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("hmac key")
    }
}
