//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request id (UUID v4) as early as possible
//! - Propagate the id to upstream requests and responses for correlation

use axum::http::HeaderValue;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request id end to end.
pub const X_REQUEST_ID: &str = "x-request-id";

/// UUID v4 request id source for tower-http's request-id layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
