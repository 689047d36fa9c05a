//! Caller-side handle of the negotiation actor

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use websh_core::config::ClientConfig;
use websh_core::error::NegotiationError;
use websh_core::{ConnectionStatus, PeerName, WebshError};
use websh_protocol::{ControlBody, StartVideo, TerminalSize};

use super::events::{ClientEvent, Command, Reply};
use super::machine::Negotiator;
use crate::peer::{PeerConnection, PeerEvent};
use crate::signaling::SignalingTransport;

/// Handle to a running client session.
///
/// Every method is a command queued to the actor; clones share the same
/// session.
#[derive(Clone)]
pub struct ConnectionManager {
    name: PeerName,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionManager {
    /// Spawn the negotiation actor over an already open relay transport.
    ///
    /// `inbound` carries raw relay text frames; `peer_events` is the queue
    /// the primitive raises its events on.
    pub fn start(
        config: ClientConfig,
        transport: Arc<dyn SignalingTransport>,
        inbound: mpsc::Receiver<String>,
        peer: Arc<dyn PeerConnection>,
        peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let name = config.peer_name();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let (negotiator, timers_rx) =
            Negotiator::new(&config, name.clone(), transport, peer, status_tx, events_tx);
        tokio::spawn(negotiator.run(commands_rx, inbound, peer_events, timers_rx));

        (
            Self {
                name,
                commands: commands_tx,
                status: status_rx,
            },
            events_rx,
        )
    }

    /// Name this client registered under
    pub fn name(&self) -> &PeerName {
        &self.name
    }

    /// Watch the externally observable status
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, WebshError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| NegotiationError::Closed)?;
        rx.await.map_err(|_| NegotiationError::Closed)?
    }

    /// Send keystrokes to a terminal session
    pub async fn send_input(&self, session: &str, text: &str) -> Result<(), WebshError> {
        self.request(|reply| Command::SendInput {
            session: session.to_string(),
            text: text.to_string(),
            reply,
        })
        .await
    }

    /// Report new local terminal geometry
    pub async fn resize(&self, session: &str, size: TerminalSize) -> Result<(), WebshError> {
        self.request(|reply| Command::Resize {
            session: session.to_string(),
            size,
            reply,
        })
        .await
    }

    /// Send a control request; returns its id
    pub async fn send_control(&self, body: ControlBody) -> Result<u32, WebshError> {
        self.request(|reply| Command::SendControl { body, reply }).await
    }

    /// Ask the server to start a video session and open its channel
    pub async fn start_video(&self, request: StartVideo) -> Result<u32, WebshError> {
        self.request(|reply| Command::StartVideo { request, reply })
            .await
    }

    /// Open a terminal session; deferred until the transport is connected
    pub async fn open_terminal(&self, session: &str) -> Result<(), WebshError> {
        self.request(|reply| Command::OpenTerminal {
            session: session.to_string(),
            reply,
        })
        .await
    }

    /// Close channels, the peer connection and the relay transport, in
    /// that order. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), WebshError> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Close { reply: tx }).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}
