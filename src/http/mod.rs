//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, protocol detection, route lookup)
//!     → forward.rs (one upstream attempt)
//!         → request.rs (rewrite target, sanitize headers)
//!         → client.rs (pooled upstream connection)
//!         → stream.rs (relay body with bounded flush latency)
//!     → response.rs (failures to 404 / 502 / 500)
//!     → Send to client
//! ```

pub mod client;
pub mod forward;
pub mod pages;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use forward::Forwarder;
pub use response::ProxyError;
pub use server::{HttpServer, ServerError};
