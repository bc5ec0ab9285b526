//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build registry → Spawn probes → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → In-flight requests finish
//!     → Probe loops exit → Process exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registry, listeners last
//! - Draining of in-flight work is bounded by the request timeout, not
//!   forcibly terminated

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
