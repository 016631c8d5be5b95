//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Prefix-to-origin route table. Defaults to the built-in provider list.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response streaming settings.
    pub streaming: StreamingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: default_routes(),
            timeouts: TimeoutConfig::default(),
            streaming: StreamingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7890").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long shutdown waits for in-flight connections to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7890".to_string(),
            max_connections: 10_000,
            shutdown_grace_secs: 10,
        }
    }
}

/// A single `prefix -> origin` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Top-level path segment, e.g. `/openai`.
    pub prefix: String,

    /// Upstream origin, e.g. `https://api.openai.com`.
    pub origin: String,
}

impl RouteConfig {
    pub fn new(prefix: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            origin: origin.into(),
        }
    }
}

/// The provider table served when no routes are configured.
pub fn default_routes() -> Vec<RouteConfig> {
    [
        ("/openai", "https://api.openai.com"),
        ("/claude", "https://api.anthropic.com"),
        ("/gemini", "https://generativelanguage.googleapis.com"),
        ("/meta", "https://www.meta.ai/api"),
        ("/groq", "https://api.groq.com/openai"),
        ("/xai", "https://api.x.ai"),
        ("/cohere", "https://api.cohere.ai"),
        ("/huggingface", "https://api-inference.huggingface.co"),
        ("/together", "https://api.together.xyz"),
        ("/novita", "https://api.novita.ai"),
        ("/portkey", "https://api.portkey.ai"),
        ("/fireworks", "https://api.fireworks.ai"),
        ("/openrouter", "https://openrouter.ai/api"),
        ("/cerebras", "https://api.cerebras.ai"),
    ]
    .into_iter()
    .map(|(prefix, origin)| RouteConfig::new(prefix, origin))
    .collect()
}

/// Timeout configuration for various operations.
///
/// No write or total-request timeout exists; a streamed response runs for as
/// long as the upstream keeps sending.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request head read timeout, and max gap between request body frames.
    pub request_read_secs: u64,

    /// Idle pooled upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            request_read_secs: 600,
            idle_secs: 90,
        }
    }
}

/// Response streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Upper bound on how long response bytes are held before being flushed.
    /// Event-stream responses are always flushed per frame.
    pub flush_interval_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
