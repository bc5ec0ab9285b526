//! Backend registry.
//!
//! # Responsibilities
//! - Own the static backend set built from configuration
//! - Serve ordered snapshots of the admissible set
//! - Apply administrative state transitions (`mark`) idempotently
//!
//! # Design Decisions
//! - No backend is added or removed after startup (static topology);
//!   only state transitions happen at runtime
//! - Shared by handle (`Arc`) between router, monitor, and admin —
//!   never a global
//! - Snapshot reads are lock-free; per-backend state is atomic

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::BackendConfig;
use crate::observability::metrics;
use crate::registry::backend::{Backend, BackendAddressError, HealthState};

/// The set of known backends, fixed at startup.
#[derive(Debug)]
pub struct BackendRegistry {
    /// Backends in configuration order.
    backends: Vec<Arc<Backend>>,
    /// Index by backend id.
    by_id: HashMap<String, usize>,
    /// Fired whenever any backend releases capacity.
    released: Arc<Notify>,
}

impl BackendRegistry {
    /// Build the registry from validated configuration.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, BackendAddressError> {
        let released = Arc::new(Notify::new());
        let mut backends = Vec::with_capacity(configs.len());
        let mut by_id = HashMap::with_capacity(configs.len());

        for config in configs {
            let backend = Arc::new(Backend::from_config(config, released.clone())?);
            tracing::info!(
                backend = %backend.id,
                address = %backend.addr,
                partition = ?backend.partition,
                max_concurrent = backend.max_concurrent_requests,
                "Registered backend"
            );
            by_id.insert(backend.id.clone(), backends.len());
            backends.push(backend);
        }

        Ok(Self {
            backends,
            by_id,
            released,
        })
    }

    /// Ordered snapshot of backends currently open for new admissions
    /// (healthy or not-yet-probed, and not draining).
    pub fn admissible(&self) -> Vec<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_admissible())
            .cloned()
            .collect()
    }

    /// All backends, in configuration order.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Look up a backend by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Backend>> {
        self.by_id.get(id).map(|&i| &self.backends[i])
    }

    /// Administratively set a backend's health state.
    ///
    /// Returns `None` for an unknown id, otherwise whether the state
    /// actually changed. Re-marking the current state is a no-op and
    /// emits no transition event.
    pub fn mark(&self, id: &str, state: HealthState) -> Option<bool> {
        let backend = self.get(id)?;
        let previous = backend.set_state(state);
        let transitioned = previous != state;
        if transitioned {
            tracing::info!(
                backend = %backend.id,
                from = %previous,
                to = %state,
                "Backend state marked"
            );
            metrics::record_health_transition(&backend.id, state.as_str());
            metrics::record_backend_health(&backend.id, backend.is_admissible());
        }
        Some(transitioned)
    }

    /// Notifier fired on every in-flight release.
    pub fn release_notify(&self) -> &Arc<Notify> {
        &self.released
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// True if no backends are registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(n: usize) -> BackendRegistry {
        let configs: Vec<BackendConfig> = (0..n)
            .map(|i| BackendConfig {
                id: format!("shard-{i}"),
                address: format!("127.0.0.1:{}", 3000 + i),
                partition: vec![i as u32],
                max_concurrent_requests: 2,
                max_batch_size: 4,
            })
            .collect();
        BackendRegistry::from_config(&configs).unwrap()
    }

    #[test]
    fn admissible_preserves_config_order() {
        let registry = registry_of(3);
        let ids: Vec<_> = registry.admissible().iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids, vec!["shard-0", "shard-1", "shard-2"]);
    }

    #[test]
    fn mark_unhealthy_removes_from_admissible() {
        let registry = registry_of(3);
        assert_eq!(registry.mark("shard-1", HealthState::Unhealthy), Some(true));
        let ids: Vec<_> = registry.admissible().iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids, vec!["shard-0", "shard-2"]);
    }

    #[test]
    fn remarking_current_state_is_noop() {
        let registry = registry_of(1);
        assert_eq!(registry.mark("shard-0", HealthState::Healthy), Some(true));
        assert_eq!(registry.mark("shard-0", HealthState::Healthy), Some(false));
    }

    #[test]
    fn mark_unknown_id_is_none() {
        let registry = registry_of(1);
        assert_eq!(registry.mark("nope", HealthState::Draining), None);
    }

    #[test]
    fn draining_round_trip() {
        let registry = registry_of(1);
        assert_eq!(registry.mark("shard-0", HealthState::Draining), Some(true));
        assert!(registry.admissible().is_empty());
        assert_eq!(registry.mark("shard-0", HealthState::Unknown), Some(true));
        assert_eq!(registry.admissible().len(), 1);
    }
}
