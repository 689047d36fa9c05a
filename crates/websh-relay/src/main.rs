//! websh signaling relay
//!
//! Headless WebSocket service that pairs user and server peers and
//! forwards their negotiation messages.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use websh_core::config::{self, RelayConfig, TurnConfig};
use websh_relay::{RelayServer, RelayState};

#[derive(Parser)]
#[command(name = "websh-relay")]
#[command(about = "websh signaling relay")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Shared secret for TURN credentials (overrides config)
    #[arg(long, env = "WEBSH_TURN_SECRET", hide_env_values = true)]
    turn_secret: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("websh relay starting...");

    // Load configuration
    let mut config: RelayConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_relay_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                RelayConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            RelayConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(secret) = args.turn_secret {
        config.turn.get_or_insert_with(TurnConfig::default).secret = secret;
    }

    let bind_addr = config.bind_address.clone();
    if config.turn.is_some() {
        tracing::info!("TURN credential issuance enabled");
    }

    let state = Arc::new(
        RelayState::from_config(config).context("Invalid TURN configuration")?,
    );

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let server = RelayServer::new(state, cancel);
    server.run(&bind_addr).await?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}
