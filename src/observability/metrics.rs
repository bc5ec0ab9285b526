//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by backend, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_inflight` (gauge): admitted requests per backend
//! - `gateway_backend_healthy` (gauge): 1=admissible, 0=not
//! - `gateway_admission_rejections_total` (counter): by reason
//! - `gateway_health_transitions_total` (counter): by backend, new state
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations in the recorder)
//! - Per-backend labels so a single hot shard is visible
//! - Exposed on a dedicated address, never on the data path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and HTTP exposition endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed proxied request.
pub fn record_request(method: &str, status: u16, backend: &str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string(),
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "backend" => backend.to_string(),
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record an admission rejection (`no_backend_available` or `overloaded`).
pub fn record_rejection(reason: &'static str) {
    counter!("gateway_admission_rejections_total", "reason" => reason).increment(1);
}

/// Record the admissibility of a backend.
pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("gateway_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a health-state transition event.
pub fn record_health_transition(backend: &str, to: &'static str) {
    counter!(
        "gateway_health_transitions_total",
        "backend" => backend.to_string(),
        "to" => to,
    )
    .increment(1);
}

/// Track the admitted request count for a backend.
pub fn set_in_flight(backend: &str, value: usize) {
    gauge!("gateway_inflight", "backend" => backend.to_string()).set(value as f64);
}
