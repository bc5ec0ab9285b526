//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - Define the error conditions a request can hit on the routing path
//! - Map each condition to the HTTP status the caller receives
//! - Render errors as structured JSON responses
//!
//! # Design Decisions
//! - `NoBackendAvailable` (no admissible backend) and `Overloaded` (all
//!   admissible backends saturated past the queue wait) are distinct so
//!   callers can tell "pool down" from "pool busy"
//! - `Overloaded` carries a Retry-After hint; the condition is transient
//! - `ProbeTimeout` is internal to the health monitor and never reaches
//!   a caller through the routing path

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the routing and probing paths.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No backend is admissible (all unhealthy or draining).
    #[error("no backend available")]
    NoBackendAvailable,

    /// Every admissible backend stayed saturated past the queue wait.
    #[error("all backends at capacity")]
    Overloaded,

    /// The selected backend could not be reached or failed mid-request.
    #[error("backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// A health probe exceeded its timeout. Internal only.
    #[error("health probe timed out after {timeout_ms}ms")]
    ProbeTimeout { timeout_ms: u64 },
}

impl GatewayError {
    /// Stable machine-readable discriminator, used in response bodies
    /// and metrics labels.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::NoBackendAvailable => "no_backend_available",
            GatewayError::Overloaded => "overloaded",
            GatewayError::BackendUnavailable { .. } => "backend_unavailable",
            GatewayError::ProbeTimeout { .. } => "probe_timeout",
        }
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Overloaded => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            // Probe errors never travel the routing path; if one ever does,
            // it is a bug and reads as an internal error.
            GatewayError::ProbeTimeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
            "error_type": self.error_type(),
        });
        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::NoBackendAvailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Overloaded.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::BackendUnavailable {
                backend: "shard-0".to_string(),
                reason: "connection refused".to_string(),
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::ProbeTimeout { timeout_ms: 2_000 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn overloaded_response_carries_retry_after() {
        let response = GatewayError::Overloaded.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).map(|v| v.as_bytes()),
            Some(&b"1"[..])
        );
    }

    #[test]
    fn error_types_are_stable() {
        assert_eq!(GatewayError::NoBackendAvailable.error_type(), "no_backend_available");
        assert_eq!(GatewayError::Overloaded.error_type(), "overloaded");
    }
}
