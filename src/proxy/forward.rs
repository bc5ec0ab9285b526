//! Request forwarding.
//!
//! # Responsibilities
//! - Admit each inbound request and forward it to the selected backend
//! - Stream response bodies without buffering (generation streams)
//! - Demote a backend immediately on connect or mid-stream failure
//! - Release reserved capacity exactly once, on every exit path
//!
//! # Design Decisions
//! - The in-flight guard rides inside the response body, so capacity is
//!   held until the last byte is streamed (or the client disconnects)
//! - Failover is allowed only for idempotent methods and only before any
//!   response bytes; streaming generation requests are never retried
//! - Hop-by-hop headers are stripped in both directions

use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{request, HeaderMap, HeaderValue, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};

use crate::balancer::RoutingDecision;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::request_id::X_REQUEST_ID;
use crate::proxy::server::AppState;
use crate::registry::Backend;

/// Hop-by-hop headers never forwarded through a proxy (RFC 9110 §7.6.1).
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Main proxy handler: admit, forward, stream back.
pub(crate) async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let started = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();

    let (mut parts, body) = request.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    // Only idempotent methods may fail over, and only before any response
    // bytes have been produced. Their bodies are empty, so re-sending is safe.
    let idempotent = matches!(method, Method::GET | Method::HEAD);
    let mut body = Some(body);
    let mut failed_backend: Option<String> = None;

    loop {
        let decision = match state
            .admission
            .admit_excluding(failed_backend.as_deref())
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    error = %err,
                    "Request rejected"
                );
                metrics::record_request(method.as_str(), err.status_code().as_u16(), "none", started);
                return err.into_response();
            }
        };
        let backend = decision.backend().clone();

        let upstream_request = match build_upstream_request(
            &parts,
            body.take().unwrap_or_else(Body::empty),
            &backend,
            &request_id,
        ) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
                return GatewayError::BackendUnavailable {
                    backend: backend.id.clone(),
                    reason: e.to_string(),
                }
                .into_response();
            }
        };

        tracing::debug!(
            request_id = %request_id,
            backend = %backend.id,
            in_flight = backend.in_flight(),
            "Forwarding request"
        );

        match state.client.request(upstream_request).await {
            Ok(upstream) => {
                let status = upstream.status();
                metrics::record_request(method.as_str(), status.as_u16(), &backend.id, started);

                let (mut up_parts, up_body) = upstream.into_parts();
                strip_hop_by_hop(&mut up_parts.headers);

                // The guard travels with the body: capacity is released when
                // the stream ends, errors, or the client goes away.
                let guarded = GuardedBody::new(up_body, decision, backend);
                return Response::from_parts(up_parts, Body::new(guarded)).into_response();
            }
            Err(e) => {
                // Connect-time failure: no response bytes were delivered.
                // Demote immediately instead of waiting for the probe cycle.
                demote(&backend, "connect failure");
                drop(decision);

                if idempotent && failed_backend.is_none() {
                    tracing::info!(
                        request_id = %request_id,
                        backend = %backend.id,
                        "Failing over to another backend"
                    );
                    failed_backend = Some(backend.id.clone());
                    body = Some(Body::empty());
                    continue;
                }

                let err = GatewayError::BackendUnavailable {
                    backend: backend.id.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(request_id = %request_id, backend = %backend.id, error = %e, "Upstream failure");
                metrics::record_request(method.as_str(), err.status_code().as_u16(), &backend.id, started);
                return err.into_response();
            }
        }
    }
}

/// Rewrite the request URI to target the backend, copying headers and
/// propagating the request ID.
fn build_upstream_request(
    parts: &request::Parts,
    body: Body,
    backend: &Backend,
    request_id: &str,
) -> Result<Request<Body>, axum::http::Error> {
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Authority::from_str(&backend.addr.to_string()).ok();
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
    builder.body(body)
}

fn demote(backend: &Arc<Backend>, cause: &'static str) {
    if backend.force_unhealthy() {
        tracing::warn!(backend = %backend.id, cause, "Backend marked unhealthy");
        metrics::record_health_transition(&backend.id, "unhealthy");
        metrics::record_backend_health(&backend.id, false);
    }
}

/// Response body wrapper that owns the routing decision.
///
/// Frames pass through untouched; a mid-stream error demotes the backend.
/// Dropping the body (stream end, error, or client disconnect) drops the
/// guard and releases the reserved slot.
struct GuardedBody {
    inner: Incoming,
    backend: Arc<Backend>,
    _decision: RoutingDecision,
}

impl GuardedBody {
    fn new(inner: Incoming, decision: RoutingDecision, backend: Arc<Backend>) -> Self {
        Self {
            inner,
            backend,
            _decision: decision,
        }
    }
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Err(e))) => {
                // Mid-stream failure: the response is partially delivered,
                // so no retry — surface the break and demote the backend.
                demote(&this.backend, "mid-stream failure");
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
