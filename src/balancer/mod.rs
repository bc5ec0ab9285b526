//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → admission.rs (snapshot admissible backends)
//!     → least_inflight.rs (order by in-flight, round-robin tie-break)
//!     → registry try_admit (CAS capacity reservation)
//!     → RoutingDecision or NoBackendAvailable / Overloaded
//! ```
//!
//! # Design Decisions
//! - The policy is fixed: least-in-flight with round-robin tie-break.
//!   Declared capacity is homogeneous per backend, so in-flight count
//!   approximates load without backend-reported queue depth
//! - Saturated backends fall through to the next-least-loaded instead of
//!   failing the request outright
//! - Waiting for capacity is bounded; saturation is surfaced, not hidden

pub mod admission;
pub mod least_inflight;

pub use admission::{Admission, RoutingDecision};
pub use least_inflight::LeastInFlight;
