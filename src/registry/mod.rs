//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     validated config → registry.rs (build static backend set)
//!
//! Runtime:
//!     health monitor → backend.rs (observe_success / observe_failure)
//!     admin API     → registry.rs mark() (drain / activate)
//!     admission     → registry.rs admissible() snapshot
//!                   → backend.rs try_admit() (CAS slot reservation)
//! ```
//!
//! # Design Decisions
//! - Topology is static: state transitions only, no membership changes
//! - Health state and in-flight counts are per-backend atomics, so the
//!   hot path takes no lock

pub mod backend;
#[allow(clippy::module_inception)]
pub mod registry;

pub use backend::{Backend, HealthState, InFlightGuard};
pub use registry::BackendRegistry;
