//! Per-request tracing spans.
//!
//! Every inbound request gets a span carrying a fresh request ID, method and
//! path. The ID lives only in logs; it is not added to the forwarded headers.

use axum::http::Request;
use tracing::Span;
use uuid::Uuid;

/// Span factory for `TraceLayer::make_span_with`.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    let request_id = Uuid::new_v4();
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}
