//! seis-gateway - channel segment and FK computation service
//!
//! Serves cached channel segments and runs FK and beam computations for
//! signal detections against the OSD and signal-enhancement services.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use seis_common::config::{TomlConfig, CONFIG_ENV_VAR};
use seis_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seis_gateway::clients::OsdClient;
use seis_gateway::collaborators::Collaborators;
use seis_gateway::AppState;

/// Command-line arguments for seis-gateway
#[derive(Parser, Debug)]
#[command(name = "seis-gateway")]
#[command(about = "Channel segment and FK computation gateway")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SEIS_GATEWAY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolved before the subscriber exists so its level can seed the filter
    let config = TomlConfig::resolve(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("seis_gateway={0},seis_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting seis-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Upstream services: {}", config.services.base_url);

    let client = Arc::new(
        OsdClient::new(config.services.clone()).context("Failed to build upstream HTTP client")?,
    );
    let collaborators = Collaborators {
        segments: client.clone(),
        fk: client.clone(),
        beam: client.clone(),
        filter: client.clone(),
        detections: client.clone(),
        stations: client,
        config: Arc::new(config.clone()),
    };

    let event_bus = EventBus::new(config.events.capacity);
    let state = AppState::new(collaborators, event_bus);
    let app = seis_gateway::build_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host {}", config.server.host))?;
    let addr = SocketAddr::new(host, args.port.unwrap_or(config.server.port));

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
