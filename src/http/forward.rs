//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! matched route + inbound request
//!     → request.rs (rewrite target, outbound header pass)
//!     → client.rs (pooled connection to the origin)
//!     → security::headers (inbound header pass)
//!     → stream.rs (bounded-latency body relay)
//!     → response to client
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream attempt per request
//! - The request body streams upstream as it arrives
//! - Cancellation is ownership: dropping the returned future or body drops the
//!   upstream request or connection

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::config::{StreamingConfig, TimeoutConfig};
use crate::http::client::{build_client, HttpClient};
use crate::http::request::build_upstream_request;
use crate::http::response::ProxyError;
use crate::http::stream::{FlushBody, HeadersGuard, StreamOrigin};
use crate::routing::Route;
use crate::security::headers::{is_event_stream, sanitize_response_headers};

/// Sends matched requests to their upstream and relays the response.
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    flush_interval: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, streaming: &StreamingConfig) -> Self {
        Self::with_client(
            build_client(timeouts),
            Duration::from_millis(streaming.flush_interval_ms),
        )
    }

    pub fn with_client(client: HttpClient, flush_interval: Duration) -> Self {
        Self {
            client,
            flush_interval,
        }
    }

    /// Forward `request` to `route`'s upstream, with `residual` as the path.
    pub async fn forward(
        &self,
        route: &Route,
        residual: &str,
        request: Request<Body>,
        client: &str,
    ) -> Result<Response, ProxyError> {
        let upstream = route.upstream();
        let outbound = build_upstream_request(request, upstream, residual)?;

        tracing::debug!(upstream = %outbound.uri(), method = %outbound.method(), "Forwarding request");

        let guard = HeadersGuard::new(StreamOrigin {
            route: route.prefix().to_string(),
            upstream: upstream.host().to_string(),
            client: client.to_string(),
        });
        let result = self.client.request(outbound).await;
        let origin = guard.disarm();
        let response = result.map_err(|e| ProxyError::upstream(upstream.host(), e))?;

        let (mut parts, body) = response.into_parts();
        let interval = if is_event_stream(&parts.headers) {
            Duration::ZERO
        } else {
            self.flush_interval
        };
        parts.headers = sanitize_response_headers(std::mem::take(&mut parts.headers));

        let body = FlushBody::new(body, interval).with_origin(origin);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
