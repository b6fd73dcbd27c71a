//! Error types shared across the crate.
//!
//! # Design Decisions
//! - Configuration problems are fatal at load time and refusals at reload
//!   time; they never surface per request
//! - Per-request dispatch errors terminate only that request's pipeline
//! - "No available destination" is its own variant so operators can alert
//!   on it separately from upstream 5xx responses

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors produced while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("parse error: {0}")]
    Parse(toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors surfaced by the dispatch pipeline for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request named a backend the topology does not know.
    #[error("backend '{0}' not found")]
    BackendNotFound(String),

    /// Health filtering and affinity narrowing left nothing to pick from.
    #[error("no available destination in backend '{0}'")]
    NoAvailableDestination(String),

    /// The affinity failure policy owned the outcome and stopped the pipeline.
    #[error("affinity failure policy aborted the request for backend '{0}'")]
    AffinityRejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_render_backend_id() {
        let err = DispatchError::NoAvailableDestination("web".to_string());
        assert_eq!(err.to_string(), "no available destination in backend 'web'");

        let err = DispatchError::BackendNotFound("api".to_string());
        assert_eq!(err.to_string(), "backend 'api' not found");
    }
}
