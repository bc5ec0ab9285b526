//! Request admission.
//!
//! # Data Flow
//! ```text
//! admit()
//!     → snapshot admissible backends (empty → NoBackendAvailable)
//!     → walk candidates in least-in-flight order, CAS-reserve a slot
//!       (a saturated pick falls through to the next-least-loaded)
//!     → all saturated → wait for a release, bounded by queue_wait
//!       (deadline exceeded → Overloaded)
//! ```
//!
//! # Design Decisions
//! - The wait re-registers on the release notifier before re-checking,
//!   so a release between check and sleep cannot be missed
//! - Every released slot wakes all waiters; they race through selection
//!   again, and CAS reservation keeps the outcome consistent

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::balancer::least_inflight::LeastInFlight;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::registry::{Backend, BackendRegistry, InFlightGuard};

/// Per-request routing decision: exactly one backend plus its reserved
/// capacity slot. Ephemeral; dropped when the response finishes.
#[derive(Debug)]
pub struct RoutingDecision {
    guard: InFlightGuard,
}

impl RoutingDecision {
    /// The backend this request was routed to.
    pub fn backend(&self) -> &Arc<Backend> {
        self.guard.backend()
    }
}

/// Admission layer: selects a backend and reserves capacity atomically.
#[derive(Debug)]
pub struct Admission {
    registry: Arc<BackendRegistry>,
    policy: LeastInFlight,
    queue_wait: Duration,
}

impl Admission {
    pub fn new(registry: Arc<BackendRegistry>, queue_wait: Duration) -> Self {
        Self {
            registry,
            policy: LeastInFlight::new(),
            queue_wait,
        }
    }

    /// Admit a request, waiting up to `queue_wait` for capacity.
    pub async fn admit(&self) -> Result<RoutingDecision, GatewayError> {
        self.admit_excluding(None).await
    }

    /// Admit a request, never selecting the excluded backend.
    ///
    /// Used for the single idempotent failover after a connect failure,
    /// where routing back to the backend that just failed is pointless.
    pub async fn admit_excluding(
        &self,
        exclude: Option<&str>,
    ) -> Result<RoutingDecision, GatewayError> {
        let deadline = Instant::now() + self.queue_wait;

        loop {
            if let Some(decision) = self.try_admit_once(exclude)? {
                return Ok(decision);
            }

            let notified = self.registry.release_notify().notified();
            tokio::pin!(notified);
            // Register before the re-check so a release in between wakes us.
            notified.as_mut().enable();

            if let Some(decision) = self.try_admit_once(exclude)? {
                return Ok(decision);
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                metrics::record_rejection("overloaded");
                return Err(GatewayError::Overloaded);
            };
            if tokio::time::timeout(remaining, notified).await.is_err() {
                metrics::record_rejection("overloaded");
                return Err(GatewayError::Overloaded);
            }
        }
    }

    /// One selection pass. `Ok(None)` means every admissible backend is
    /// currently saturated.
    fn try_admit_once(
        &self,
        exclude: Option<&str>,
    ) -> Result<Option<RoutingDecision>, GatewayError> {
        let mut snapshot = self.registry.admissible();
        if let Some(excluded) = exclude {
            snapshot.retain(|b| b.id != excluded);
        }
        if snapshot.is_empty() {
            metrics::record_rejection("no_backend_available");
            return Err(GatewayError::NoBackendAvailable);
        }

        for backend in self.policy.candidates(&snapshot) {
            if let Some(guard) = backend.try_admit() {
                tracing::debug!(
                    backend = %guard.id,
                    in_flight = guard.in_flight(),
                    "Request admitted"
                );
                return Ok(Some(RoutingDecision { guard }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::registry::HealthState;

    fn registry(n: usize, capacity: usize) -> Arc<BackendRegistry> {
        let configs: Vec<BackendConfig> = (0..n)
            .map(|i| BackendConfig {
                id: format!("shard-{i}"),
                address: format!("127.0.0.1:{}", 3000 + i),
                partition: vec![i as u32],
                max_concurrent_requests: capacity,
                max_batch_size: 4,
            })
            .collect();
        Arc::new(BackendRegistry::from_config(&configs).unwrap())
    }

    #[tokio::test]
    async fn fails_fast_when_no_backend_admissible() {
        let registry = registry(2, 2);
        registry.mark("shard-0", HealthState::Unhealthy);
        registry.mark("shard-1", HealthState::Unhealthy);

        let admission = Admission::new(registry, Duration::from_millis(200));
        let err = admission.admit().await.unwrap_err();
        assert!(matches!(err, GatewayError::NoBackendAvailable));
    }

    #[tokio::test]
    async fn overloaded_when_saturated_and_queue_disabled() {
        let registry = registry(1, 1);
        let admission = Admission::new(registry, Duration::ZERO);

        let held = admission.admit().await.unwrap();
        let err = admission.admit().await.unwrap_err();
        assert!(matches!(err, GatewayError::Overloaded));
        drop(held);
    }

    #[tokio::test]
    async fn queued_admission_succeeds_after_release() {
        let registry = registry(1, 1);
        let admission = Arc::new(Admission::new(registry, Duration::from_secs(2)));

        let held = admission.admit().await.unwrap();
        let waiter = {
            let admission = admission.clone();
            tokio::spawn(async move { admission.admit().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let decision = waiter.await.unwrap().unwrap();
        assert_eq!(decision.backend().id, "shard-0");
    }

    #[tokio::test]
    async fn saturated_pick_falls_through_to_next_backend() {
        let registry = registry(2, 1);
        let admission = Admission::new(registry.clone(), Duration::ZERO);

        let first = admission.admit().await.unwrap();
        let second = admission.admit().await.unwrap();
        assert_ne!(first.backend().id, second.backend().id);
    }

    #[tokio::test]
    async fn excluded_backend_is_never_selected() {
        let registry = registry(2, 4);
        let admission = Admission::new(registry, Duration::ZERO);

        for _ in 0..4 {
            let decision = admission.admit_excluding(Some("shard-0")).await.unwrap();
            assert_eq!(decision.backend().id, "shard-1");
        }
    }
}
