//! Failure translation.
//!
//! # Responsibilities
//! - Map proxy failures to client responses (404 / 400 / 502 / 500)
//! - Log each failure with client and upstream context
//!
//! # Design Decisions
//! - Client-facing messages are fixed phrases; upstream addresses and
//!   resolver output only reach the logs
//! - Upstream failures use a JSON body AI client libraries can parse
//! - A request body that fails mid-upload is the client's fault, not the
//!   upstream's, and is not counted as an upstream error

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which stage of reaching the upstream failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS, TCP connect, TLS handshake or connect timeout.
    Connect,
    /// The connection was reset or closed before response headers arrived.
    Transport,
}

impl FailureKind {
    fn phrase(self) -> &'static str {
        match self {
            FailureKind::Connect => "upstream connection failed",
            FailureKind::Transport => "upstream closed the connection",
        }
    }
}

/// Errors raised while handling a proxied request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no route for path {0}")]
    RouteNotFound(String),

    #[error("upstream {host} unreachable: {source}")]
    UpstreamUnreachable {
        host: String,
        kind: FailureKind,
        #[source]
        source: BoxError,
    },

    #[error("client request body failed: {0}")]
    RequestBody(#[source] BoxError),

    #[error("failed to build upstream request: {0}")]
    RequestConstruction(#[from] axum::http::Error),
}

impl ProxyError {
    /// Classify a pooled client failure.
    pub fn upstream(host: &str, error: hyper_util::client::legacy::Error) -> Self {
        let connect = error.is_connect();
        Self::classify(host, connect, Box::new(error))
    }

    fn classify(host: &str, connect: bool, error: BoxError) -> Self {
        if !connect && caused_by_request_body(&*error) {
            return ProxyError::RequestBody(error);
        }
        let kind = if connect {
            FailureKind::Connect
        } else {
            FailureKind::Transport
        };
        ProxyError::UpstreamUnreachable {
            host: host.to_string(),
            kind,
            source: error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::RequestConstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Emit the log record for this failure.
    pub fn report(&self, client: &str) {
        match self {
            ProxyError::RouteNotFound(path) => {
                tracing::warn!(path = %path, client = %client, "Route not found");
            }
            ProxyError::UpstreamUnreachable { host, source, .. } => {
                tracing::error!(
                    client = %client,
                    upstream = %host,
                    error = %source,
                    "Upstream request failed"
                );
            }
            ProxyError::RequestBody(e) => {
                tracing::warn!(client = %client, error = %e, "Client request body failed");
            }
            ProxyError::RequestConstruction(e) => {
                tracing::error!(client = %client, error = %e, "Failed to build upstream request");
            }
        }
    }
}

/// Inbound bodies surface errors as `axum::Error` (read failure or body
/// timeout); anything else in the chain came from the upstream side.
fn caused_by_request_body(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<axum::Error>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn json_error(status: StatusCode, message: String) -> Response {
    let body = json!({
        "error": {
            "message": message,
            "type": "proxy_error",
        }
    });
    let mut response = (status, body.to_string()).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ProxyError::RouteNotFound(_) => (status, "Not Found").into_response(),
            ProxyError::UpstreamUnreachable { kind, .. } => {
                json_error(status, format!("Proxy Connection Error: {}", kind.phrase()))
            }
            ProxyError::RequestBody(_) => {
                json_error(status, "Proxy Request Error: request body could not be read".to_string())
            }
            ProxyError::RequestConstruction(_) => {
                json_error(status, "Proxy Request Error: invalid upstream request".to_string())
            }
        }
    }
}
