//! Prefix matching logic.
//!
//! # Responsibilities
//! - Extract the top-level path segment used as the lookup key
//! - Confirm a prefix match (exact, or followed by `/`)
//! - Produce the residual path forwarded upstream
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefixes form a flat namespace (validated at startup), so at most one
//!   route can match any path
//! - No regex in hot path

use crate::routing::router::Route;

/// A resolved route together with the path to forward upstream.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'p, 'r> {
    pub route: &'r Route,
    /// Request path with the prefix stripped; never empty.
    pub residual: &'p str,
}

/// First segment of an absolute path, without the leading slash.
///
/// `/openai/v1/models` yields `openai`; `/` and relative paths yield `None`.
pub fn top_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let segment = rest.split('/').next().unwrap_or(rest);
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

/// Strip `prefix` from `path` if it matches on a segment boundary.
///
/// Returns the residual path, normalized to `/` when nothing remains.
pub fn strip_route_prefix<'p>(prefix: &str, path: &'p str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
