//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single inference backend and its accelerator partition
//! - Track in-flight requests (for least-in-flight selection)
//! - Enforce max_concurrent_requests via CAS reservation
//! - Track health state (Unknown/Healthy/Unhealthy/Draining)
//!
//! # Design Decisions
//! - All runtime state is atomics; no per-request locking
//! - Hysteresis counters live on the backend so probe tasks stay stateless
//! - State transitions are CAS-based so a transition is observed exactly
//!   once even when probes and request handlers race
//! - Capacity release is tied to guard Drop, covering completion,
//!   cancellation, and error paths alike

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

use crate::config::BackendConfig;
use crate::observability::metrics;

/// Health state of a backend.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Startup state, before the first probe verdict. Admissible.
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
    /// Administrative state: no new admissions, in-flight work finishes.
    /// Entered and left only via `mark`; probe verdicts never override it.
    Draining = 3,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            3 => HealthState::Draining,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Draining => "draining",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inference backend bound to a fixed accelerator partition.
#[derive(Debug)]
pub struct Backend {
    /// Unique backend identifier.
    pub id: String,
    /// The address of the backend.
    pub addr: SocketAddr,
    /// Pre-calculated base URL.
    pub base_url: Url,
    /// Accelerator device IDs this backend owns.
    pub partition: Vec<u32>,
    /// Maximum concurrent requests admitted to this backend.
    pub max_concurrent_requests: usize,
    /// Declared maximum batch size (informational).
    pub max_batch_size: usize,

    /// Current health state (see `HealthState`).
    state: AtomicU8,
    /// Consecutive probe failure count.
    consecutive_failures: AtomicUsize,
    /// Consecutive probe success count.
    consecutive_successes: AtomicUsize,
    /// Number of currently admitted requests.
    in_flight: AtomicUsize,
    /// Registry-wide notifier, fired on every capacity release so queued
    /// admissions can re-run selection.
    released: Arc<Notify>,
}

/// Error constructing a backend from configuration.
#[derive(Debug, thiserror::Error)]
#[error("backend {id} has an unusable address {address}: {reason}")]
pub struct BackendAddressError {
    pub id: String,
    pub address: String,
    pub reason: String,
}

impl Backend {
    /// Build a backend from its configuration entry.
    pub fn from_config(
        config: &BackendConfig,
        released: Arc<Notify>,
    ) -> Result<Self, BackendAddressError> {
        let addr: SocketAddr = config.address.parse().map_err(|e: std::net::AddrParseError| {
            BackendAddressError {
                id: config.id.clone(),
                address: config.address.clone(),
                reason: e.to_string(),
            }
        })?;
        let base_url =
            Url::parse(&format!("http://{}", addr)).map_err(|e| BackendAddressError {
                id: config.id.clone(),
                address: config.address.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: config.id.clone(),
            addr,
            base_url,
            partition: config.partition.clone(),
            max_concurrent_requests: config.max_concurrent_requests,
            max_batch_size: config.max_batch_size,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            released,
        })
    }

    /// Current health state.
    pub fn state(&self) -> HealthState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// True if the backend may receive new admissions.
    ///
    /// `Unknown` is admissible so a cold gateway can serve before the first
    /// probe cycle completes; the first observed failure still demotes it.
    pub fn is_admissible(&self) -> bool {
        matches!(self.state(), HealthState::Unknown | HealthState::Healthy)
    }

    /// Current number of admitted requests.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Try to reserve one in-flight slot.
    ///
    /// CAS loop against `max_concurrent_requests`; concurrent admissions can
    /// never push the counter past the limit. Returns a guard that releases
    /// the slot exactly once on drop.
    pub fn try_admit(self: &Arc<Self>) -> Option<InFlightGuard> {
        let mut prev = self.in_flight.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_concurrent_requests {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        metrics::set_in_flight(&self.id, prev + 1);
        Some(InFlightGuard {
            backend: self.clone(),
        })
    }

    // --- Health transitions ---

    /// Record a successful probe. Returns true if the backend transitioned
    /// to `Healthy` as a result (exactly once per transition).
    pub fn observe_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let current = self.state.load(Ordering::Relaxed);
        if current == HealthState::Healthy as u8 || current == HealthState::Draining as u8 {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes < healthy_threshold {
            return false;
        }

        // CAS from the observed state; a racing transition wins only once.
        self.state
            .compare_exchange(
                current,
                HealthState::Healthy as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Record a failed probe. Returns true if the backend transitioned to
    /// `Unhealthy` as a result (exactly once per transition).
    pub fn observe_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        let current = self.state.load(Ordering::Relaxed);
        if current == HealthState::Unhealthy as u8 || current == HealthState::Draining as u8 {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures < unhealthy_threshold {
            return false;
        }

        self.state
            .compare_exchange(
                current,
                HealthState::Unhealthy as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Demote immediately after a connect or mid-stream failure, without
    /// waiting for the probe cycle. Returns true on actual transition.
    pub fn force_unhealthy(&self) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            if current == HealthState::Unhealthy as u8 || current == HealthState::Draining as u8 {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                HealthState::Unhealthy as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(x) => current = x,
            }
        }
    }

    /// Set an explicit state (administrative path). Returns the previous
    /// state; re-setting the current state is a no-op transition.
    pub(crate) fn set_state(&self, state: HealthState) -> HealthState {
        // Fresh hysteresis when an operator moves the backend.
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.state.swap(state as u8, Ordering::AcqRel).into()
    }
}

/// RAII guard for one reserved in-flight slot.
///
/// Dropping the guard releases the slot and wakes queued admissions, so
/// release happens exactly once on completion, cancellation, or error.
#[derive(Debug)]
pub struct InFlightGuard {
    backend: Arc<Backend>,
}

impl Deref for InFlightGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl InFlightGuard {
    /// The backend this slot was reserved on.
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let prev = self.backend.in_flight.fetch_sub(1, Ordering::AcqRel);
        metrics::set_in_flight(&self.backend.id, prev.saturating_sub(1));
        self.backend.released.notify_waiters();
    }
}
