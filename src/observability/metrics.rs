//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, route
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_upstream_errors_total` (counter): failed upstream attempts by route
//! - `proxy_client_disconnects_total` (counter): streams abandoned by the client
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels for route prefix and status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request (response headers sent).
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a failed attempt to reach an upstream.
pub fn record_upstream_error(route: &str) {
    counter!("proxy_upstream_errors_total", "route" => route.to_string()).increment(1);
}

/// Record a response stream dropped before the upstream finished.
pub fn record_client_disconnect(route: &str) {
    counter!("proxy_client_disconnects_total", "route" => route.to_string()).increment(1);
}
