//! Outbound request construction.
//!
//! # Responsibilities
//! - Rewrite the request target to the upstream origin
//! - Apply the outbound header pass
//! - Resolve the client address used in logs
//!
//! # Design Decisions
//! - The body is moved, never buffered
//! - The inbound HTTP version is not copied; the pooled client picks its own
//! - Client IP headers are read for logging only and never forwarded

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};

use crate::routing::Upstream;
use crate::security::headers::sanitize_request_headers;

static ALI_CDN_REAL_IP: HeaderName = HeaderName::from_static("ali-cdn-real-ip");
static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Turn an inbound request into the request sent to `upstream`.
///
/// `residual` is the inbound path with the route prefix stripped; the query
/// string is carried over unchanged.
pub fn build_upstream_request(
    request: Request<Body>,
    upstream: &Upstream,
    residual: &str,
) -> Result<Request<Body>, axum::http::Error> {
    let (parts, body) = request.into_parts();
    let uri = upstream.uri_for(residual, parts.uri.query())?;

    let mut builder = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = sanitize_request_headers(&parts.headers, upstream);
    }
    builder.body(body)
}

/// Best-effort address of the end client, for logs.
///
/// Prefers the CDN's `Ali-Cdn-Real-Ip`, then the first `X-Forwarded-For`
/// entry, then the socket peer.
pub fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    if let Some(ip) = header_str(headers, &ALI_CDN_REAL_IP) {
        return ip.to_string();
    }
    if let Some(first) = header_str(headers, &X_FORWARDED_FOR).and_then(|xff| xff.split(',').next()) {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    remote.to_string()
}

fn header_str<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
