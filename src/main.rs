//! AI API Proxy
//!
//! Forwards requests for `/<prefix>/...` to a fixed upstream API origin per
//! prefix (OpenAI, Anthropic, Gemini, ...), stripping CDN and client-address
//! headers and relaying streaming responses as they arrive.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request   ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//!     ────────────────▶│   net    │──▶│  http    │──▶│  routing  │──▶│ security │
//!                      │ listener │   │  server  │   │  (prefix) │   │ headers  │
//!                      └──────────┘   └──────────┘   └───────────┘   └────┬─────┘
//!                                                                         │
//!     Client Response  ┌──────────┐   ┌──────────┐                  ┌─────▼────┐
//!     ◀────────────────│  stream  │◀──│ security │◀─────────────────│  client  │◀── Upstream
//!                      │  (flush) │   │ headers  │                  │  (pool)  │    origin
//!                      └──────────┘   └──────────┘                  └──────────┘
//! ```

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use ai_api_proxy::config::validation::validate_config;
use ai_api_proxy::config::{load_config, ConfigError, LogFormat, ProxyConfig};
use ai_api_proxy::lifecycle::signals::spawn_signal_handler;
use ai_api_proxy::net::Listener;
use ai_api_proxy::observability::{logging, metrics};
use ai_api_proxy::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "ai-api-proxy", version, about = "Path-prefix gateway for AI provider APIs")]
struct Cli {
    /// Port to listen on; replaces the port of the configured bind address.
    port: Option<u16>,

    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn with_port(bind_address: &str, port: u16) -> Result<String, AddrParseError> {
    let mut addr: SocketAddr = bind_address.parse()?;
    addr.set_port(port);
    Ok(addr.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.bind_address = with_port(&config.listener.bind_address, port)?;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ai-api-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        routes = config.routes.len(),
        flush_interval_ms = config.streaming.flush_interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_argument_replaces_bind_port() {
        assert_eq!(with_port("0.0.0.0:7890", 8080).unwrap(), "0.0.0.0:8080");
        assert_eq!(with_port("[::1]:7890", 9000).unwrap(), "[::1]:9000");
        assert!(with_port("localhost:7890", 80).is_err());
    }

    #[test]
    fn cli_accepts_positional_port() {
        let cli = Cli::try_parse_from(["ai-api-proxy", "8080", "--log-format", "json"]).unwrap();
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.config.is_none());
    }
}
