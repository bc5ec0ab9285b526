//! Inference Gateway Library
//!
//! A load-aware, health-checking transparent proxy for a static pool of
//! inference backends, each pinned to a disjoint accelerator partition.

pub mod admin;
pub mod balancer;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod registry;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use lifecycle::Shutdown;
pub use proxy::GatewayServer;
pub use registry::{BackendRegistry, HealthState};
