//! websh client
//!
//! Connects to a server peer through the signaling relay and attaches the
//! local terminal to one of its sessions.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use websh_client::peer::RtcPeer;
use websh_client::{ClientEvent, ConnectionManager, WsSignaling};
use websh_core::config::{self, ClientConfig};
use websh_core::ConnectionStatus;
use websh_protocol::StartVideo;

#[derive(Parser)]
#[command(name = "websh")]
#[command(about = "Open a terminal on a websh server")]
#[command(version)]
struct Args {
    /// Server peer to connect to (overrides config)
    #[arg(short, long)]
    target: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay URL (overrides config)
    #[arg(short, long)]
    relay: Option<String>,

    /// Terminal session name (overrides config)
    #[arg(short, long)]
    session: Option<String>,

    /// Name to register under (overrides config)
    #[arg(long)]
    name: Option<String>,

    /// Also start a video session for this display
    #[arg(long)]
    display: Option<u32>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not mix with terminal output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_client_config_path);
    let mut config: ClientConfig = config::load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    if let Some(target) = args.target {
        config.target = target;
    }
    if let Some(relay) = args.relay {
        config.relay_url = relay;
    }
    if let Some(session) = args.session {
        config.session = session;
    }
    if args.name.is_some() {
        config.name = args.name;
    }
    config.validate().context("Invalid configuration")?;

    if args.save_config {
        config::save_config(&config_path, &config)
            .with_context(|| format!("Failed to save config to {:?}", config_path))?;
        tracing::info!("Saved configuration to {:?}", config_path);
    }

    let (transport, inbound) = WsSignaling::connect(&config.relay_url)
        .await
        .context("Failed to connect to relay")?;
    let (peer, peer_events) = RtcPeer::new(&config.ice_servers)
        .await
        .context("Failed to create peer connection")?;

    let session = config.session.clone();
    let (manager, mut events) =
        ConnectionManager::start(config, Arc::new(transport), inbound, peer, peer_events);
    tracing::info!("Registered as {}", manager.name());

    manager
        .open_terminal(&session)
        .await
        .context("Failed to open terminal")?;

    let mut video_requested = args.display.is_none();
    let mut status = manager.status();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl+C, closing...");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("[{}]", current);
                if current.is_terminal() {
                    break;
                }
                if !video_requested && current == ConnectionStatus::Connected {
                    video_requested = true;
                    if let Some(display) = args.display {
                        if let Err(e) = manager.start_video(StartVideo::new(display)).await {
                            tracing::warn!("Failed to start video: {}", e);
                        }
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = manager.send_input(&session, &format!("{}\n", line)).await {
                        tracing::warn!("Input dropped: {}", e);
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Some(ClientEvent::TerminalOutput { data, .. }) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(data.as_bytes())?;
                    stdout.flush()?;
                }
                Some(ClientEvent::RelayError { message }) => eprintln!("relay: {}", message),
                Some(ClientEvent::Failed { reason }) => eprintln!("failed: {}", reason),
                Some(ClientEvent::PeerDisconnected { name }) => {
                    eprintln!("{} disconnected", name);
                }
                Some(ClientEvent::ControlError { id, message }) => {
                    eprintln!("control request {} failed: {}", id, message);
                }
                Some(ClientEvent::TurnCredentials(credential)) => {
                    tracing::info!("Using relay servers {:?}", credential.urls);
                }
                Some(other) => tracing::debug!("Event: {:?}", other),
                None => break,
            },
        }
    }

    manager.close().await?;
    Ok(())
}
