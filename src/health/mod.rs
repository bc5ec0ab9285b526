//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! monitor.rs:
//!     One task per backend, independent periodic timer
//!     → GET probe with bounded timeout
//!     → registry backend state (hysteresis transitions)
//!
//! Passive path (proxy):
//!     Connect / mid-stream failure observed
//!     → force_unhealthy() immediately, no probe-cycle wait
//!
//! State machine:
//!     Unknown/Healthy → Unhealthy: consecutive failures >= K
//!     Unhealthy → Healthy: consecutive successes >= M
//!     Draining: administrative only; probes never set or clear it
//! ```
//!
//! # Design Decisions
//! - Probe timers are per backend and jittered, never one shared sweep
//! - Hysteresis prevents flapping; each transition is emitted once
//! - ProbeTimeout stays internal; callers never see probe errors

pub mod monitor;

pub use monitor::HealthMonitor;
