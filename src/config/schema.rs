//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy director.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to backends.
    pub routes: Vec<RouteConfig>,

    /// Backend definitions, each with its destinations and policies.
    pub backends: Vec<BackendConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Route configuration mapping requests to backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Backend id to dispatch to.
    pub backend: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Backend configuration: destinations plus the policies governing them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Load-balancing policy id (e.g., "round-robin", "power-of-two").
    #[serde(default = "default_load_balancing")]
    pub load_balancing: String,

    /// What to do when every destination is unhealthy.
    #[serde(default)]
    pub on_no_eligible: NoEligibleBehavior,

    /// Active health check settings for this backend.
    #[serde(default)]
    pub health: HealthCheckConfig,

    /// Session affinity settings for this backend.
    #[serde(default)]
    pub affinity: AffinityConfig,

    /// Destination endpoints.
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

fn default_load_balancing() -> String {
    "round-robin".to_string()
}

/// Behavior when health filtering leaves no eligible destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoEligibleBehavior {
    /// Fail the request fast with a distinct error.
    #[default]
    Fail,
    /// Fall back to the full destination set, unhealthy included.
    UseAll,
}

/// Destination endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// Unique destination identifier (scoped to its backend).
    pub id: String,

    /// Destination base address (e.g., "http://127.0.0.1:3000").
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in milliseconds.
    pub interval_ms: u64,

    /// Health check timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    /// A threshold of 1 marks a destination healthy on its first success.
    pub healthy_threshold: u32,

    /// Maximum probes in flight at once within this backend.
    pub max_concurrent_probes: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            max_concurrent_probes: 8,
        }
    }
}

/// Session affinity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Enable sticky sessions for this backend.
    pub enabled: bool,

    /// Affinity mode id ("cookie", "header", "custom-key").
    pub mode: String,

    /// Failure policy id ("redistribute", "fail").
    pub failure_policy: String,

    /// Cookie or header name carrying the affinity key.
    pub key_name: String,

    /// How the key is protected on the wire.
    pub protection: KeyProtection,

    /// Secret for signed keys. Required when protection = "signed".
    pub secret: String,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: "cookie".to_string(),
            failure_policy: "redistribute".to_string(),
            key_name: ".director-affinity".to_string(),
            protection: KeyProtection::Plain,
            secret: String::new(),
        }
    }
}

/// Wire protection applied to affinity keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeyProtection {
    /// Base64-encoded destination id, no integrity protection.
    #[default]
    Plain,
    /// Base64 payload plus HMAC-SHA256 tag; tampered keys are rejected.
    Signed,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
