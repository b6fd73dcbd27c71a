//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, unknown policy ids rejected)
//!     → ProxyConfig (validated, immutable)
//!     → applied to the runtime model as one atomic update per backend
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Director::apply_config diffs it into the topology
//!     → a rejected update leaves the previous topology serving
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AffinityConfig, BackendConfig, DestinationConfig, HealthCheckConfig, KeyProtection,
    NoEligibleBehavior, ProxyConfig, RouteConfig,
};
