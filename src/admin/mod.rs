//! Admin API.
//!
//! Operational surface for the gateway, served on its own listener and
//! never on the data path. Draining is triggered here — it is an
//! administrative state, not a probe-derived one.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::admin::auth::admin_auth;
use crate::admin::handlers::{activate_backend, drain_backend, get_backends, get_status};
use crate::registry::BackendRegistry;

/// State shared by all admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BackendRegistry>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

/// Build the admin router with bearer-token auth on every route.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/backends/{id}/drain", post(drain_backend))
        .route("/admin/backends/{id}/activate", post(activate_backend))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth))
        .with_state(state)
}
