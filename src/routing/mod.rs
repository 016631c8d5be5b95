//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (lookup by first path segment)
//!     → matcher.rs (confirm prefix boundary, compute residual path)
//!     → Return: RouteMatch or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Validate (shape, duplicates, nesting, origins)
//!     → Parse origins into Upstream targets
//!     → Sort by prefix and freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment lookup only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::RouteMatch;
pub use router::{OriginError, Route, RouteTable, Upstream};
