//! Route table and lookup.
//!
//! # Responsibilities
//! - Store validated routes, sorted by prefix
//! - Look up the route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(log n) lookup by first path segment
//! - Explicit NoMatch rather than silent default

use std::fmt;
use std::str::FromStr;

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};
use url::Url;

use crate::config::validation::{validate_routes, ValidationError};
use crate::config::RouteConfig;
use crate::routing::matcher::{strip_route_prefix, top_segment, RouteMatch};

/// Why an origin string cannot be used as a forwarding target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("{0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("must not end with '/'")]
    TrailingSlash,

    #[error("must not carry credentials, query or fragment")]
    UnexpectedComponent,

    #[error("host is not a valid authority")]
    InvalidAuthority,
}

/// A parsed forwarding target: scheme, authority and optional base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    origin: String,
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    base_path: String,
}

impl Upstream {
    /// Parse an origin such as `https://api.openai.com` or
    /// `https://openrouter.ai/api`.
    pub fn parse(origin: &str) -> Result<Self, OriginError> {
        if origin.ends_with('/') {
            return Err(OriginError::TrailingSlash);
        }

        let url = Url::parse(origin)?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(OriginError::UnsupportedScheme(other.to_string())),
        };
        if url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(OriginError::UnexpectedComponent);
        }

        let host = url.host_str().ok_or(OriginError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority =
            Authority::from_str(&authority).map_err(|_| OriginError::InvalidAuthority)?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|_| OriginError::InvalidAuthority)?;

        let base_path = match url.path() {
            "/" => String::new(),
            path => path.to_string(),
        };

        Ok(Self {
            origin: origin.to_string(),
            scheme,
            authority,
            host_header,
            base_path,
        })
    }

    /// The origin exactly as configured.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Host and optional port, as sent in the `Host` header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn host(&self) -> &str {
        self.authority.host()
    }

    /// `Host` header value for requests to this upstream.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Build the outbound URI for a residual path and optional query.
    pub fn uri_for(&self, residual: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
        let path_and_query = match query {
            Some(q) => format!("{}{}?{}", self.base_path, residual, q),
            None => format!("{}{}", self.base_path, residual),
        };
        let path_and_query = PathAndQuery::from_str(&path_and_query)?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}

/// A validated `prefix -> upstream` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    prefix: String,
    upstream: Upstream,
}

impl Route {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }
}

/// Immutable, validated route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by prefix.
    routes: Vec<Route>,
}

impl RouteTable {
    /// Validate and compile route configuration.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, Vec<ValidationError>> {
        validate_routes(configs)?;

        let mut routes = Vec::with_capacity(configs.len());
        let mut errors = Vec::new();
        for config in configs {
            match Upstream::parse(&config.origin) {
                Ok(upstream) => routes.push(Route {
                    prefix: config.prefix.clone(),
                    upstream,
                }),
                Err(source) => errors.push(ValidationError::InvalidOrigin {
                    prefix: config.prefix.clone(),
                    origin: config.origin.clone(),
                    source,
                }),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        routes.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        Ok(Self { routes })
    }

    /// Resolve a request path to a route and residual path.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<RouteMatch<'a, '_>> {
        let segment = top_segment(path)?;
        let index = self
            .routes
            .binary_search_by(|route| route.prefix[1..].cmp(segment))
            .ok()?;
        let route = &self.routes[index];
        let residual = strip_route_prefix(&route.prefix, path)?;
        Some(RouteMatch { route, residual })
    }

    /// Routes in prefix order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
