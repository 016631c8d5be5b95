//! AI API proxy library.
//!
//! Forwards `/<prefix>/...` requests to a fixed upstream origin per prefix,
//! with header sanitization and streaming (SSE) responses.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
