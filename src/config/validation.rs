//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Reject malformed, duplicate and nested route prefixes
//! - Reject origins that cannot be forwarded to
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, RouteConfig};
use crate::routing::router::{OriginError, Upstream};

/// Paths answered by the proxy itself; a route with one of these prefixes
/// could never be reached.
const RESERVED_PREFIXES: &[&str] = &["/index.html", "/robots.txt"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("no routes configured")]
    NoRoutes,

    #[error("route prefix {prefix:?} {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("route prefix {0:?} is reserved")]
    ReservedPrefix(String),

    #[error("route prefix {0:?} is configured more than once")]
    DuplicatePrefix(String),

    #[error("route prefix {inner:?} is nested under {outer:?}")]
    NestedPrefix { outer: String, inner: String },

    #[error("route {prefix:?} has invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        prefix: String,
        origin: String,
        #[source]
        source: OriginError,
    },
}

/// Validate a full proxy configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_connections"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs"));
    }
    if config.timeouts.request_read_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_read_secs"));
    }
    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.idle_secs"));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if let Err(route_errors) = validate_routes(&config.routes) {
        errors.extend(route_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a route table in isolation.
///
/// Matching assumes a flat namespace: every prefix is one top-level segment,
/// and no prefix equals or nests under another. Anything else is rejected
/// here instead of being resolved by match order at runtime.
pub fn validate_routes(routes: &[RouteConfig]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut seen = HashSet::new();
    for route in routes {
        if let Err(reason) = check_prefix(&route.prefix) {
            errors.push(ValidationError::InvalidPrefix {
                prefix: route.prefix.clone(),
                reason,
            });
        } else if RESERVED_PREFIXES.contains(&route.prefix.as_str()) {
            errors.push(ValidationError::ReservedPrefix(route.prefix.clone()));
        } else if !seen.insert(route.prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix(route.prefix.clone()));
        }

        if let Err(source) = Upstream::parse(&route.origin) {
            errors.push(ValidationError::InvalidOrigin {
                prefix: route.prefix.clone(),
                origin: route.origin.clone(),
                source,
            });
        }
    }

    errors.extend(find_nested(routes));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_prefix(prefix: &str) -> Result<(), &'static str> {
    let Some(segment) = prefix.strip_prefix('/') else {
        return Err("must start with '/'");
    };
    if segment.is_empty() {
        return Err("must name a path segment");
    }
    if segment.ends_with('/') {
        return Err("must not end with '/'");
    }
    if segment.contains('/') {
        return Err("must be a single path segment");
    }
    if segment.contains(['?', '#']) {
        return Err("must not contain a query or fragment");
    }
    Ok(())
}

/// Pairs where one prefix is a path-prefix of another (`/a` and `/a/b`).
fn find_nested(routes: &[RouteConfig]) -> Vec<ValidationError> {
    let mut nested = Vec::new();
    for outer in routes {
        for inner in routes {
            if inner.prefix.len() > outer.prefix.len()
                && inner.prefix.starts_with(&outer.prefix)
                && inner.prefix.as_bytes()[outer.prefix.len()] == b'/'
            {
                nested.push(ValidationError::NestedPrefix {
                    outer: outer.prefix.clone(),
                    inner: inner.prefix.clone(),
                });
            }
        }
    }
    nested
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str, origin: &str) -> RouteConfig {
        RouteConfig::new(prefix, origin)
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn rejects_malformed_prefixes() {
        let routes = vec![
            route("openai", "https://api.openai.com"),
            route("/", "https://api.openai.com"),
            route("/claude/", "https://api.anthropic.com"),
            route("/a/b", "https://api.x.ai"),
        ];
        let errors = validate_routes(&routes).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidPrefix { .. })));
    }

    #[test]
    fn rejects_duplicate_prefixes() {
        let routes = vec![
            route("/openai", "https://api.openai.com"),
            route("/openai", "https://example.com"),
        ];
        let errors = validate_routes(&routes).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicatePrefix("/openai".into())]
        );
    }

    #[test]
    fn detects_nested_prefixes() {
        let routes = vec![
            route("/api", "https://a.example"),
            route("/api/v2", "https://b.example"),
            route("/apiv2", "https://c.example"),
        ];
        let nested = find_nested(&routes);
        assert_eq!(
            nested,
            vec![ValidationError::NestedPrefix {
                outer: "/api".into(),
                inner: "/api/v2".into(),
            }]
        );
    }

    #[test]
    fn rejects_reserved_prefixes() {
        let errors = validate_routes(&[route("/robots.txt", "https://a.example")]).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ReservedPrefix("/robots.txt".into())]
        );
    }

    #[test]
    fn rejects_bad_origins() {
        let routes = vec![
            route("/a", "ftp://files.example"),
            route("/b", "https://api.example/"),
            route("/c", "https://api.example?key=1"),
            route("/d", "not a url"),
        ];
        let errors = validate_routes(&routes).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidOrigin { .. })));
    }

    #[test]
    fn accepts_origin_with_base_path() {
        assert_eq!(
            validate_routes(&[route("/openrouter", "https://openrouter.ai/api")]),
            Ok(())
        );
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.listener.max_connections = 0;
        config.routes = Vec::new();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::ZeroValue("listener.max_connections")));
        assert!(errors.contains(&ValidationError::NoRoutes));
    }
}
