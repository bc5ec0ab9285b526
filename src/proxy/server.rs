//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID, inbound limit)
//! - Spawn the health monitor
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::routing::any;
use axum::Router;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::balancer::Admission;
use crate::config::GatewayConfig;
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::proxy::forward::proxy_handler;
use crate::proxy::request_id::RequestIdLayer;
use crate::registry::backend::BackendAddressError;
use crate::registry::BackendRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub admission: Arc<Admission>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the inference gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<BackendRegistry>,
}

impl GatewayServer {
    /// Build the server and its subsystems from validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, BackendAddressError> {
        let registry = Arc::new(BackendRegistry::from_config(&config.backends)?);
        let admission = Arc::new(Admission::new(
            registry.clone(),
            Duration::from_millis(config.admission.queue_wait_ms),
        ));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            registry: registry.clone(),
            admission,
            client,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            registry,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            // Timeout covers time-to-response-headers; streamed bodies run on.
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
    }

    /// Handle to the backend registry (shared with admin and tests).
    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Spawns the per-backend health probes, then serves until shutdown is
    /// triggered; in-flight requests finish before return.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.registry.len(),
            "Gateway server starting"
        );

        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        monitor.spawn(&shutdown);

        let mut rx = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}
