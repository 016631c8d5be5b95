//! Pooled upstream HTTP client.
//!
//! # Responsibilities
//! - Build the single client shared by every route
//! - Keep idle keep-alive connections per origin
//! - Speak HTTP and HTTPS (rustls with the platform's root store, falling
//!   back to the bundled Mozilla roots)
//!
//! # Design Decisions
//! - One client for the whole process; cloning it shares the pool
//! - Connect timeout bounds only connection establishment, never the
//!   response stream

use std::time::Duration;

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::TimeoutConfig;

/// Client used to reach upstream origins.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Create the shared client with connection pooling.
pub fn build_client(timeouts: &TimeoutConfig) -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    http_connector.set_nodelay(true);
    http_connector.enforce_http(false);

    let roots = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "No usable platform root certificates, using bundled roots");
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };
    let https_connector = roots
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
        .build(https_connector);

    tracing::debug!(
        connect_timeout_secs = timeouts.connect_secs,
        idle_timeout_secs = timeouts.idle_secs,
        "Upstream connection pool configured"
    );

    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn builds_with_default_timeouts() {
        let _client = build_client(&TimeoutConfig::default());
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = build_client(&TimeoutConfig::default());
        let request = Request::get(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();
        let error = client.request(request).await.unwrap_err();
        assert!(error.is_connect());
    }
}
