//! Inference Gateway
//!
//! A load-balancing control plane for a pool of stateful inference
//! backends, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │              INFERENCE GATEWAY               │
//!                         │                                              │
//!    Client Request       │  ┌─────────┐   ┌───────────┐   ┌──────────┐ │
//!    ─────────────────────┼─▶│  proxy  │──▶│ balancer  │──▶│ registry │ │
//!                         │  │ server  │   │ admission │   │ try_admit│ │
//!                         │  └─────────┘   └───────────┘   └────┬─────┘ │
//!                         │                                     │       │
//!    Client Response      │  ┌──────────────────┐               ▼       │
//!    ◀────────────────────┼──│ streamed body +  │◀──────── backend ─────┼──▶ Inference
//!                         │  │ in-flight guard  │           forward     │    backends
//!                         │  └──────────────────┘                       │    (disjoint
//!                         │                                            │     partitions)
//!                         │  ┌────────────────────────────────────────┐ │
//!                         │  │          Cross-Cutting Concerns        │ │
//!                         │  │  ┌────────┐ ┌────────┐ ┌─────────────┐ │ │
//!                         │  │  │ config │ │ health │ │observability│ │ │
//!                         │  │  └────────┘ │ probes │ └─────────────┘ │ │
//!                         │  │  ┌────────┐ └────────┘ ┌─────────────┐ │ │
//!                         │  │  │ admin  │            │  lifecycle  │ │ │
//!                         │  │  └────────┘            └─────────────┘ │ │
//!                         │  └────────────────────────────────────────┘ │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;

use inference_gateway::admin::{admin_router, AdminState};
use inference_gateway::config::load_config;
use inference_gateway::lifecycle::{signals, Shutdown};
use inference_gateway::observability::{logging, metrics};
use inference_gateway::GatewayServer;

/// Load-balancing gateway for a static pool of inference backends.
#[derive(Parser, Debug)]
#[command(name = "inference-gateway", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backends = config.backends.len(),
        bind_address = %config.listener.bind_address,
        queue_wait_ms = config.admission.queue_wait_ms,
        "inference-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = GatewayServer::new(config.clone())?;
    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    if config.admin.enabled {
        let state = AdminState {
            registry: server.registry(),
            api_key: config.admin.api_key.clone().into(),
            started_at: Instant::now(),
        };
        let bind_address = config.admin.bind_address.clone();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            match TcpListener::bind(&bind_address).await {
                Ok(listener) => {
                    tracing::info!(address = %bind_address, "Admin API listening");
                    let result = axum::serve(listener, admin_router(state))
                        .with_graceful_shutdown(async move {
                            let _ = rx.recv().await;
                        })
                        .await;
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Admin API server error");
                    }
                }
                Err(e) => {
                    tracing::error!(address = %bind_address, error = %e, "Failed to bind admin API")
                }
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
