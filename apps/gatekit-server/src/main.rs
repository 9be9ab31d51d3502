//! Gatekit server.
//!
//! # Configuration
//!
//! Loaded from an optional YAML file (`--config`) and overridden by
//! `GATEKIT__*` environment variables, e.g.
//! `GATEKIT__DISPATCHER__BASE_URL=https://api.example.com/v1`.
//!
//! `RUST_LOG` takes precedence over `logging.level`.

mod app;
mod config;
mod routes;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, LogFormat, LoggingConfig};

/// Gatekit authorization gateway
#[derive(Parser, Debug)]
#[command(name = "gatekit-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid logging.level '{}'", logging.level))?;
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
    }
    .context("failed to install the tracing subscriber")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    init_tracing(&config.logging)?;

    let router = app::build(&config)?;
    let listener = tokio::net::TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;

    tracing::info!(
        addr = %config.server.listen_addr,
        downstream = %config.dispatcher.base_url,
        environment = %config.bootstrap_cache.environment,
        "gatekit server listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}
