//! # azul-restapi: Binary Entry Point
//!
//! Loads configuration from the environment, initializes logging and the
//! audit sink, and starts the Axum HTTP server.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;

use azul_restapi::config::AppConfig;
use azul_restapi::state::AppState;

/// Start the Azul API server.
#[derive(Debug, Parser)]
#[command(name = "azul-restapi", version, about)]
struct Cli {
    /// Bind host. Defaults to RESTAPI_HOST or `localhost`.
    #[arg(long)]
    host: Option<String>,

    /// Bind port. Defaults to RESTAPI_PORT or 8080.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let _log_guard = azul_restapi::logging::init(&config.logging)?;
    let (audit_sink, _audit_guard) = azul_restapi::logging::audit_sink(&config.audit)?;

    tracing::info!(
        security = %config.security,
        prefix = %config.server.api_prefix(),
        root_path = %config.server.root_path,
        "configuration loaded"
    );

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, audit_sink).context("failed to build HTTP client")?;
    let app = azul_restapi::app(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!("Azul API listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
