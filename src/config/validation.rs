//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend set integrity (unique ids, unique addresses)
//! - Enforce disjoint accelerator partitions
//! - Validate value ranges (capacities > 0, probe timeout < interval)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the parsed config
//! - Runs before the config is accepted into the system

use std::collections::HashMap;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic violation found in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("duplicate backend id: {0}")]
    DuplicateId(String),

    #[error("duplicate backend address: {0}")]
    DuplicateAddress(String),

    #[error("backend {id} has invalid address {address}")]
    InvalidAddress { id: String, address: String },

    #[error("backend {id}: max_concurrent_requests must be > 0")]
    ZeroConcurrency { id: String },

    #[error("backend {id}: max_batch_size must be > 0")]
    ZeroBatchSize { id: String },

    #[error("device {device} assigned to both {first} and {second}")]
    OverlappingPartition {
        device: u32,
        first: String,
        second: String,
    },

    #[error("health_check.{field} must be >= 1")]
    ZeroThreshold { field: &'static str },

    #[error("health_check.timeout_ms ({timeout_ms}) must be shorter than interval_ms ({interval_ms})")]
    ProbeTimeoutTooLong { timeout_ms: u64, interval_ms: u64 },
}

/// Validate the configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen_ids: HashMap<&str, ()> = HashMap::new();
    let mut seen_addrs: HashMap<&str, ()> = HashMap::new();
    // device id -> owning backend id
    let mut device_owners: HashMap<u32, &str> = HashMap::new();

    for backend in &config.backends {
        if seen_ids.insert(backend.id.as_str(), ()).is_some() {
            errors.push(ValidationError::DuplicateId(backend.id.clone()));
        }
        if seen_addrs.insert(backend.address.as_str(), ()).is_some() {
            errors.push(ValidationError::DuplicateAddress(backend.address.clone()));
        }
        if backend.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                id: backend.id.clone(),
                address: backend.address.clone(),
            });
        }
        if backend.max_concurrent_requests == 0 {
            errors.push(ValidationError::ZeroConcurrency {
                id: backend.id.clone(),
            });
        }
        if backend.max_batch_size == 0 {
            errors.push(ValidationError::ZeroBatchSize {
                id: backend.id.clone(),
            });
        }
        for &device in &backend.partition {
            if let Some(owner) = device_owners.insert(device, backend.id.as_str()) {
                if owner != backend.id {
                    errors.push(ValidationError::OverlappingPartition {
                        device,
                        first: owner.to_string(),
                        second: backend.id.clone(),
                    });
                }
            }
        }
    }

    if config.health_check.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "unhealthy_threshold",
        });
    }
    if config.health_check.healthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold {
            field: "healthy_threshold",
        });
    }
    if config.health_check.enabled && config.health_check.timeout_ms >= config.health_check.interval_ms
    {
        errors.push(ValidationError::ProbeTimeoutTooLong {
            timeout_ms: config.health_check.timeout_ms,
            interval_ms: config.health_check.interval_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
