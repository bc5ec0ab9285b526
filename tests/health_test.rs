//! Health monitoring tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use inference_gateway::config::{BackendConfig, HealthCheckConfig};
use inference_gateway::health::HealthMonitor;
use inference_gateway::lifecycle::Shutdown;
use inference_gateway::registry::{BackendRegistry, HealthState};

mod common;

fn registry_for(addr: std::net::SocketAddr) -> Arc<BackendRegistry> {
    let config = BackendConfig {
        id: "shard-0".to_string(),
        address: addr.to_string(),
        partition: vec![0],
        max_concurrent_requests: 4,
        max_batch_size: 4,
    };
    Arc::new(BackendRegistry::from_config(&[config]).unwrap())
}

fn probe_config(unhealthy_threshold: u32, healthy_threshold: u32) -> HealthCheckConfig {
    HealthCheckConfig {
        enabled: true,
        interval_ms: 100,
        timeout_ms: 50,
        path: "/health".to_string(),
        unhealthy_threshold,
        healthy_threshold,
    }
}

#[tokio::test]
async fn failing_backend_flips_unhealthy_after_threshold() {
    let addr = common::start_programmable_backend(|| async {
        (500, "Internal Server Error".to_string())
    })
    .await;
    let registry = registry_for(addr);
    let shutdown = Shutdown::new();

    HealthMonitor::new(registry.clone(), probe_config(3, 1)).spawn(&shutdown);

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let backend = registry.get("shard-0").unwrap();
    assert_eq!(backend.state(), HealthState::Unhealthy);
    shutdown.trigger();
}

#[tokio::test]
async fn backend_recovers_after_consecutive_successes() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            // Fail the first probes, then come back.
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                (503, "starting up".to_string())
            } else {
                (200, "ok".to_string())
            }
        }
    })
    .await;
    let registry = registry_for(addr);
    let shutdown = Shutdown::new();

    HealthMonitor::new(registry.clone(), probe_config(2, 2)).spawn(&shutdown);

    // Long enough for the failure streak, the flip, and the recovery.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let backend = registry.get("shard-0").unwrap();
    assert_eq!(backend.state(), HealthState::Healthy);
    assert!(calls.load(Ordering::SeqCst) >= 5);
    shutdown.trigger();
}

#[tokio::test]
async fn unresponsive_backend_times_out_and_flips() {
    let addr = common::start_unresponsive_backend().await;
    let registry = registry_for(addr);
    let shutdown = Shutdown::new();

    HealthMonitor::new(registry.clone(), probe_config(2, 1)).spawn(&shutdown);

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let backend = registry.get("shard-0").unwrap();
    assert_eq!(backend.state(), HealthState::Unhealthy);
    shutdown.trigger();
}

#[tokio::test]
async fn probes_never_clear_draining() {
    let addr = common::start_mock_backend("ok").await;
    let registry = registry_for(addr);
    registry.mark("shard-0", HealthState::Draining);
    let shutdown = Shutdown::new();

    HealthMonitor::new(registry.clone(), probe_config(2, 1)).spawn(&shutdown);

    tokio::time::sleep(Duration::from_millis(800)).await;
    let backend = registry.get("shard-0").unwrap();
    assert_eq!(backend.state(), HealthState::Draining);
    shutdown.trigger();
}

#[tokio::test]
async fn disabled_monitor_leaves_state_untouched() {
    let addr = common::unused_addr().await;
    let registry = registry_for(addr);
    let shutdown = Shutdown::new();

    let mut config = probe_config(1, 1);
    config.enabled = false;
    HealthMonitor::new(registry.clone(), config).spawn(&shutdown);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let backend = registry.get("shard-0").unwrap();
    assert_eq!(backend.state(), HealthState::Unknown);
    shutdown.trigger();
}
