//! Transparent proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum setup, middleware, request ID)
//!     → balancer admission (RoutingDecision with reserved capacity)
//!     → forward.rs (URI rewrite, header hygiene, streaming pass-through)
//!     → response streamed to client; guard released when the body ends
//! ```
//!
//! # Design Decisions
//! - The gateway exposes the same request/response contract as the
//!   backends themselves; it adds no routes of its own on the data path
//! - Generation streams are never buffered or retried
//! - Admin and metrics listeners are separate from the data path

pub mod forward;
pub mod request_id;
pub mod server;

pub use request_id::{RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
