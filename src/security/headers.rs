//! Header sanitization for forwarded traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop, CDN and client-IP headers before forwarding
//! - Rewrite `Host` to the upstream authority
//! - Disable intermediate buffering on responses
//!
//! # Design Decisions
//! - Never forward X-Forwarded-For, not even appended; upstreams learn nothing
//!   about the proxy topology
//! - Both passes are pure functions over header maps
//! - Response pass only adds or overrides, never removes

use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::routing::Upstream;

/// Nginx and most CDNs disable response buffering when they see this.
pub static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Request headers that are never forwarded, by exact (lowercase) name.
pub const DENIED_EXACT: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Request headers that are never forwarded, by (lowercase) name prefix.
pub const DENIED_PREFIXES: &[&str] = &[
    "cf-",
    "forward",
    "cdn",
    "x-real-ip",
    "true-client-ip",
    "ali-cdn-",
];

/// True if a request header must not be forwarded upstream.
///
/// `HeaderName` is always lowercase, so this holds for any casing the client
/// sent.
pub fn is_denied(name: &HeaderName) -> bool {
    let name = name.as_str();
    DENIED_EXACT.contains(&name)
        || DENIED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || name == X_FORWARDED_FOR.as_str()
}

/// Header names listed as connection options in `Connection`.
fn connection_options(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build the header map sent upstream from the client's headers.
pub fn sanitize_request_headers(headers: &HeaderMap, upstream: &Upstream) -> HeaderMap {
    let listed = connection_options(headers);

    let mut sanitized = HeaderMap::with_capacity(headers.len() + 1);
    for (name, value) in headers {
        if is_denied(name) || listed.iter().any(|option| option == name.as_str()) {
            continue;
        }
        sanitized.append(name.clone(), value.clone());
    }

    sanitized.insert(HOST, upstream.host_header().clone());
    sanitized
}

/// True if the response is a server-sent event stream.
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("event-stream"))
        .unwrap_or(false)
}

/// Adjust upstream response headers before they reach the client.
pub fn sanitize_response_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.insert(X_ACCEL_BUFFERING.clone(), HeaderValue::from_static("no"));

    if is_event_stream(&headers) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    headers
}
