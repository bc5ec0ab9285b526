//! Active health probing.
//!
//! # Responsibilities
//! - Run one independent probe task per backend
//! - Send a bounded liveness probe each interval
//! - Drive hysteresis transitions on the backend state

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rand::Rng;

use crate::config::HealthCheckConfig;
use crate::error::GatewayError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::{Backend, BackendRegistry};

/// Spawns and owns the per-backend probe tasks.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            config,
            client,
        }
    }

    /// Spawn one probe loop per backend. Each loop runs on its own timer,
    /// fully decoupled from request handling, and exits on shutdown.
    pub fn spawn(self, shutdown: &Shutdown) {
        if !self.config.enabled {
            tracing::info!("Active health probes disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            path = %self.config.path,
            backends = self.registry.len(),
            "Health monitor starting"
        );

        for backend in self.registry.all() {
            let backend = backend.clone();
            let config = self.config.clone();
            let client = self.client.clone();
            let rx = shutdown.subscribe();
            tokio::spawn(probe_loop(backend, config, client, rx));
        }
    }
}

/// Periodic probe loop for a single backend.
async fn probe_loop(
    backend: Arc<Backend>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = Duration::from_millis(config.interval_ms);

    // Stagger start so probes across backends do not align.
    let offset = rand::thread_rng().gen_range(0..config.interval_ms.max(1));
    tokio::select! {
        _ = time::sleep(Duration::from_millis(offset)) => {}
        _ = shutdown.recv() => return,
    }

    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                probe_once(&backend, &config, &client).await;
            }
            _ = shutdown.recv() => {
                tracing::debug!(backend = %backend.id, "Probe loop stopping");
                break;
            }
        }
    }
}

/// Run one probe and apply its verdict.
async fn probe_once(
    backend: &Arc<Backend>,
    config: &HealthCheckConfig,
    client: &Client<HttpConnector, Body>,
) {
    match probe(backend, config, client).await {
        Ok(()) => {
            if backend.observe_success(config.healthy_threshold as usize) {
                tracing::info!(backend = %backend.id, "Backend recovered");
                metrics::record_health_transition(&backend.id, "healthy");
            }
        }
        Err(err) => {
            tracing::warn!(backend = %backend.id, error = %err, "Health probe failed");
            if backend.observe_failure(config.unhealthy_threshold as usize) {
                tracing::warn!(backend = %backend.id, "Backend marked unhealthy");
                metrics::record_health_transition(&backend.id, "unhealthy");
            }
        }
    }
    metrics::record_backend_health(&backend.id, backend.is_admissible());
}

/// Send one liveness probe with a bounded timeout.
async fn probe(
    backend: &Arc<Backend>,
    config: &HealthCheckConfig,
    client: &Client<HttpConnector, Body>,
) -> Result<(), GatewayError> {
    let uri = format!("http://{}{}", backend.addr, config.path);
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("user-agent", "inference-gateway-health")
        .body(Body::empty())
        .map_err(|e| GatewayError::BackendUnavailable {
            backend: backend.id.clone(),
            reason: format!("probe request build failed: {e}"),
        })?;

    let timeout = Duration::from_millis(config.timeout_ms);
    match time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) if response.status().is_success() => Ok(()),
        Ok(Ok(response)) => Err(GatewayError::BackendUnavailable {
            backend: backend.id.clone(),
            reason: format!("probe returned {}", response.status()),
        }),
        Ok(Err(e)) => Err(GatewayError::BackendUnavailable {
            backend: backend.id.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Err(GatewayError::ProbeTimeout {
            timeout_ms: config.timeout_ms,
        }),
    }
}
