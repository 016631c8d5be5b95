//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → headers.rs (strip hop-by-hop/CDN/client-IP headers, rewrite Host)
//!     → Forward to upstream
//!
//! Inbound response:
//!     → headers.rs (disable buffering, fix event-stream caching)
//!     → Stream to client
//! ```
//!
//! # Design Decisions
//! - No trust in client-supplied forwarding headers
//! - Nothing about the client or proxy topology leaks upstream

pub mod headers;
