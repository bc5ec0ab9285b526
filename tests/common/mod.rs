//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use inference_gateway::config::{BackendConfig, GatewayConfig};
use inference_gateway::lifecycle::Shutdown;
use inference_gateway::registry::BackendRegistry;
use inference_gateway::GatewayServer;

/// Start a simple mock backend that returns a fixed 200 response on any
/// path (including the health probe path).
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that records the raw head of every request it receives.
pub async fn start_capture_backend(captured: Arc<Mutex<Vec<String>>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let captured = captured.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        captured.lock().unwrap().push(head);
                        let response =
                            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that streams chunks with a delay between them.
///
/// With `complete = false` the connection is severed after the last chunk
/// without the terminal chunk, simulating a backend dying mid-stream.
pub async fn start_streaming_backend(
    chunks: Vec<&'static str>,
    delay: Duration,
    complete: bool,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let chunks = chunks.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n";
                        let _ = socket.write_all(head.as_bytes()).await;
                        for chunk in &chunks {
                            let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                            if socket.write_all(framed.as_bytes()).await.is_err() {
                                return;
                            }
                            let _ = socket.flush().await;
                            tokio::time::sleep(delay).await;
                        }
                        if complete {
                            let _ = socket.write_all(b"0\r\n\r\n").await;
                            let _ = socket.shutdown().await;
                        }
                        // else: drop the socket mid-stream
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that accepts connections but never responds.
pub async fn start_unresponsive_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        // Hold the connection open forever.
                        let _socket = socket;
                        std::future::pending::<()>().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = vec![0u8; 4096];
    let mut head = String::new();
    loop {
        match socket.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                head.push_str(&String::from_utf8_lossy(&buf[..n]));
                if head.contains("\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    head
}

/// Base gateway config: given backends, probes off, queueing off.
pub fn gateway_config(backends: &[(&str, SocketAddr, usize)]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends = backends
        .iter()
        .enumerate()
        .map(|(i, (id, addr, capacity))| BackendConfig {
            id: id.to_string(),
            address: addr.to_string(),
            partition: vec![i as u32],
            max_concurrent_requests: *capacity,
            max_batch_size: 4,
        })
        .collect();
    config.health_check.enabled = false;
    config.admission.queue_wait_ms = 0;
    config
}

/// Spawn the gateway on an ephemeral port; returns its address, the
/// registry handle, and the shutdown coordinator.
pub async fn start_gateway(
    config: GatewayConfig,
) -> (SocketAddr, Arc<BackendRegistry>, Arc<Shutdown>) {
    let server = GatewayServer::new(config).unwrap();
    let registry = server.registry();
    let shutdown = Arc::new(Shutdown::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for the server to start accepting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, registry, shutdown)
}
