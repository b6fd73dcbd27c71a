//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request id)
//!     → routing table decides the backend
//!     → dispatch pipeline picks the destination
//!     → forward via hyper client, holding the in-flight guard
//!     → response mutations applied (affinity establishment)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{HttpServer, X_DIRECTOR_ERROR};
