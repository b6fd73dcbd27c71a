//! Proxy Director
//!
//! The data-plane decision engine of a reverse proxy: for every inbound
//! request it picks a live upstream destination, honoring sticky-session
//! constraints and load-balancing policy, against a backend topology that
//! mutates at runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  PROXY DIRECTOR                   │
//!                        │                                                   │
//!   Client Request       │  ┌─────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ─────────────────────┼─▶│  http   │──▶│ routing  │──▶│   dispatch   │  │
//!                        │  │ server  │   │  table   │   │   pipeline   │  │
//!                        │  └─────────┘   └──────────┘   └──────┬───────┘  │
//!                        │                                       │          │
//!                        │              ┌────────────────────────┼────────┐ │
//!                        │              ▼                        ▼        │ │
//!                        │       ┌──────────────┐       ┌──────────────┐  │ │
//!                        │       │   affinity   │       │   balancer   │  │ │
//!                        │       │ (narrow set) │       │ (pick one)   │  │ │
//!                        │       └──────┬───────┘       └──────┬───────┘  │ │
//!                        │              │                      │          │ │
//!                        │              ▼                      ▼          │ │
//!                        │       ┌──────────────────────────────────┐     │ │
//!                        │       │          runtime model           │     │ │
//!                        │       │  backends → snapshots → dests    │◀────┼─┼── topology
//!                        │       └──────────────▲───────────────────┘     │ │   updates
//!                        │                      │                         │ │   (config)
//!                        │              ┌───────┴────────┐                │ │
//!                        │              │ health probers │ one task per   │ │
//!                        │              └────────────────┘ backend        │ │
//!                        └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod routing;

// Traffic management
pub mod affinity;
pub mod balancer;
pub mod health;
pub mod model;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use dispatch::{Director, Dispatch};
pub use error::{ConfigError, DispatchError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
