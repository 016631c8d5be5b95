//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router (homepage, robots.txt, proxy fallback)
//! - Serve each accepted connection on its own task (HTTP/1.1 and HTTP/2)
//! - Resolve routes and hand matched requests to the forwarder
//! - Stop accepting on shutdown and drain open connections
//!
//! # Design Decisions
//! - No write or total request timeout; streams may run indefinitely
//! - Request head and body reads are bounded by `timeouts.request_read_secs`
//! - A closed client connection drops the handler future, which cancels the
//!   upstream request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::{Layer, ServiceExt};
use tower_http::timeout::{RequestBodyTimeout, RequestBodyTimeoutLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, ValidationError};
use crate::http::forward::Forwarder;
use crate::http::pages::{render_home, ROBOTS_TXT};
use crate::http::request::client_ip;
use crate::http::response::ProxyError;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::observability::tracing::make_request_span;
use crate::routing::RouteTable;

/// Responses slower than this are logged even when successful.
const SLOW_RESPONSE: Duration = Duration::from_secs(5);

/// Error type for server construction.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid route configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
}

type App = RequestBodyTimeout<Router>;

/// HTTP server for the proxy.
pub struct HttpServer {
    app: App,
    routes: Arc<RouteTable>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let forwarder = Forwarder::new(&config.timeouts, &config.streaming);
        Self::with_forwarder(config, forwarder)
    }

    /// Create a server around an existing forwarder.
    pub fn with_forwarder(config: ProxyConfig, forwarder: Forwarder) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::from_config(&config.routes).map_err(ServerError::Config)?);

        tracing::info!(routes = routes.len(), "Route table built");

        let state = AppState {
            routes: Arc::clone(&routes),
            forwarder,
        };
        let read_timeout = Duration::from_secs(config.timeouts.request_read_secs);
        let app = RequestBodyTimeoutLayer::new(read_timeout).layer(Self::build_router(state));

        Ok(Self {
            app,
            routes,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(home_handler))
            .route("/index.html", any(home_handler))
            .route("/robots.txt", any(robots_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(self.config.timeouts.request_read_secs))
            .half_close(false);

        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.spawn_connection(
                            &builder,
                            &tracker,
                            stream,
                            peer,
                            permit,
                            shutdown.resubscribe(),
                        );
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        drop(listener);

        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        tracing::info!(
            active_connections = tracker.active_count(),
            grace_secs = grace.as_secs(),
            "Draining connections"
        );
        if tokio::time::timeout(grace, tracker.wait_for_drain()).await.is_err() {
            tracing::warn!(
                active_connections = tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        builder: &auto::Builder<TokioExecutor>,
        tracker: &ConnectionTracker,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let builder = builder.clone();
        let guard = tracker.track();
        let app = self.app.clone();

        let service = service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            app.clone().oneshot(request)
        });

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            tracing::trace!(connection_id = %connection_id, peer = %peer, "Serving connection");

            let connection = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(connection);

            let result = tokio::select! {
                result = connection.as_mut() => result,
                _ = shutdown.recv() => {
                    connection.as_mut().graceful_shutdown();
                    connection.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "Connection ended with error");
            }
            drop(guard);
        });
    }

    /// Get the compiled route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn home_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_home(&state.routes))
}

async fn robots_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], ROBOTS_TXT)
}

/// Main proxy handler.
/// Looks up the route and forwards the request to its upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let client = client_ip(request.headers(), peer);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    tracing::info!(method = %method, path = %path, client = %client, "Request received");

    let Some(matched) = state.routes.resolve(&path) else {
        let error = ProxyError::RouteNotFound(path.clone());
        error.report(&client);
        metrics::record_request(method.as_str(), StatusCode::NOT_FOUND.as_u16(), "none", start);
        return error.into_response();
    };
    let route = matched.route;

    let response = match state
        .forwarder
        .forward(route, matched.residual, request, &client)
        .await
    {
        Ok(response) => response,
        Err(error) => {
            error.report(&client);
            if matches!(error, ProxyError::UpstreamUnreachable { .. }) {
                metrics::record_upstream_error(route.prefix());
            }
            error.into_response()
        }
    };

    let status = response.status();
    let elapsed = start.elapsed();
    metrics::record_request(method.as_str(), status.as_u16(), route.prefix(), start);
    if status != StatusCode::OK || elapsed > SLOW_RESPONSE {
        tracing::info!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            path = %path,
            upstream = %route.upstream(),
            "Response"
        );
    }
    response
}
