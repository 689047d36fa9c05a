//! Negotiation actor
//!
//! Owns the peer connection, the channel multiplexer and the relay
//! transport. Relay frames, primitive events, caller commands and its own
//! timers are all consumed from one `select!` loop, so no state here is
//! shared.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use websh_core::config::{ClientConfig, IceServerConfig};
use websh_core::error::NegotiationError;
use websh_core::{ConnectionStatus, Credential, PeerName, WebshError};
use websh_protocol::{
    ChannelVariant, ControlBody, Envelope, ForwardKind, IceCandidate, PeerKind, ProtocolError,
    RelayEvent, RelayNotice, SessionDescription, TerminalSize,
};

use super::events::{ClientEvent, Command, Timer};
use crate::mux::{ChannelMultiplexer, MuxEvent};
use crate::peer::{ChannelEvent, PeerConnection, PeerEvent, PeerState};
use crate::signaling::SignalingTransport;

pub(crate) struct Negotiator {
    name: PeerName,
    target: String,
    session: String,
    resize_delay: Duration,
    negotiation_timeout: Option<Duration>,
    transport: Arc<dyn SignalingTransport>,
    peer: Arc<dyn PeerConnection>,
    mux: ChannelMultiplexer,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<ClientEvent>,
    timers: mpsc::UnboundedSender<Timer>,
    /// A local offer was sent and its answer has not been applied
    offer_pending: bool,
    has_remote_description: bool,
    /// Remote candidates received before any remote description
    pending_candidates: Vec<IceCandidate>,
    connected_once: bool,
}

impl Negotiator {
    pub(crate) fn new(
        config: &ClientConfig,
        name: PeerName,
        transport: Arc<dyn SignalingTransport>,
        peer: Arc<dyn PeerConnection>,
        status: watch::Sender<ConnectionStatus>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<Timer>) {
        let (timers, timers_rx) = mpsc::unbounded_channel();
        let negotiator = Self {
            name,
            target: config.target.clone(),
            session: config.session.clone(),
            resize_delay: config.resize_delay,
            negotiation_timeout: config.negotiation_timeout,
            transport,
            peer,
            mux: ChannelMultiplexer::new(TerminalSize::default()),
            status,
            events,
            timers,
            offer_pending: false,
            has_remote_description: false,
            pending_candidates: Vec::new(),
            connected_once: false,
        };
        (negotiator, timers_rx)
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbound: mpsc::Receiver<String>,
        mut peer_events: mpsc::UnboundedReceiver<PeerEvent>,
        mut timers: mpsc::UnboundedReceiver<Timer>,
    ) {
        self.open().await;

        let deadline = tokio::time::sleep(self.negotiation_timeout.unwrap_or(Duration::ZERO));
        tokio::pin!(deadline);
        let mut deadline_armed = self.negotiation_timeout.is_some();
        let mut relay_open = true;
        let mut peer_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("All connection handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
                text = inbound.recv(), if relay_open => match text {
                    Some(text) => self.handle_relay(&text).await,
                    None => {
                        relay_open = false;
                        self.relay_closed();
                    }
                },
                event = peer_events.recv(), if peer_open => match event {
                    Some(event) => self.handle_peer_event(event).await,
                    None => {
                        tracing::debug!("Peer event queue closed");
                        peer_open = false;
                    }
                },
                Some(timer) = timers.recv() => self.handle_timer(timer).await,
                () = &mut deadline, if deadline_armed => {
                    deadline_armed = false;
                    if !self.connected_once {
                        self.fail(NegotiationError::Timeout.to_string());
                    }
                }
            }
        }
    }

    /// Create the control channel, then register and ask for pairing
    async fn open(&mut self) {
        if let Err(e) = self.mux.open_control(self.peer.as_ref()).await {
            self.report_error("Failed to create control channel", e);
        }

        let register = Envelope::register(self.name.as_str(), PeerKind::User);
        if let Err(e) = self.transport.send(&register).await {
            self.fail(format!("Failed to register: {}", e));
            return;
        }
        self.set_status(ConnectionStatus::Registering);
        tracing::info!("Registering as {}", self.name);

        if let Err(e) = self.transport.send(&Envelope::connect(&self.target)).await {
            self.fail(format!("Failed to request pairing: {}", e));
            return;
        }
        self.set_status(ConnectionStatus::AwaitingPairing);
        tracing::info!("Requested pairing with {}", self.target);
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }

    fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Move to `next` unless the session already ended
    fn set_status(&self, next: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            tracing::info!("Status: {} -> {}", current, next);
            *current = next;
            true
        });
    }

    fn enter_negotiating(&self) {
        if matches!(
            self.current_status(),
            ConnectionStatus::Idle | ConnectionStatus::Registering | ConnectionStatus::AwaitingPairing
        ) {
            self.set_status(ConnectionStatus::Negotiating);
        }
    }

    fn fail(&self, reason: String) {
        if self.current_status().is_terminal() {
            return;
        }
        tracing::error!("Connection failed: {}", reason);
        self.set_status(ConnectionStatus::Failed);
        self.emit(ClientEvent::Failed { reason });
    }

    fn report_error(&self, context: &str, error: impl fmt::Display) {
        let message = format!("{}: {}", context, error);
        tracing::warn!("{}", message);
        self.emit(ClientEvent::NegotiationError { message });
    }

    fn relay_closed(&self) {
        tracing::warn!("Relay connection closed");
        self.emit(ClientEvent::RelayClosed);
        if !self.connected_once {
            self.fail("Relay connection closed before the peer connected".to_string());
        }
    }

    /// Close channels, the peer connection, then the relay transport
    async fn shutdown(&mut self) {
        tracing::info!("Closing connection to {}", self.target);
        self.mux.close_all().await;
        if let Err(e) = self.peer.close().await {
            tracing::warn!("Failed to close peer connection: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            tracing::warn!("Failed to close relay connection: {}", e);
        }
        self.status.send_if_modified(|current| {
            if *current == ConnectionStatus::Disconnected {
                return false;
            }
            *current = ConnectionStatus::Disconnected;
            true
        });
    }

    /// Returns true when the actor should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SendInput {
                session,
                text,
                reply,
            } => {
                let result = self.mux.send_input(&session, &text).await;
                let _ = reply.send(result.map_err(WebshError::from));
            }
            Command::Resize {
                session,
                size,
                reply,
            } => {
                let result = self.mux.resize(&session, size).await;
                let _ = reply.send(result.map_err(WebshError::from));
            }
            Command::SendControl { body, reply } => {
                let result = self.mux.send_control(body).await;
                let _ = reply.send(result.map_err(WebshError::from));
            }
            Command::StartVideo { request, reply } => {
                let session = request.display_id.to_string();
                let result = match self.mux.send_control(ControlBody::StartVideo(request)).await {
                    Ok(id) => self
                        .mux
                        .open_video(self.peer.as_ref(), &session)
                        .await
                        .map(|()| id),
                    Err(e) => Err(e.into()),
                };
                let _ = reply.send(result);
            }
            Command::OpenTerminal { session, reply } => {
                let result = self.mux.open_terminal(self.peer.as_ref(), &session).await;
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn handle_relay(&mut self, text: &str) {
        let event = match RelayEvent::parse(text) {
            Ok(event) => event,
            Err(e) if e.is_malformed() => {
                tracing::warn!("Dropping malformed relay message: {}", e);
                return;
            }
            Err(e) => {
                tracing::debug!("Ignoring relay message: {}", e);
                return;
            }
        };

        match event {
            RelayEvent::Notice(notice) => self.handle_notice(notice).await,
            RelayEvent::Forwarded {
                kind,
                ref from,
                ref data,
                ..
            } => {
                tracing::debug!("Received {} from {}", kind.as_str(), from);
                match kind {
                    ForwardKind::Offer => self.handle_remote_offer(&event).await,
                    ForwardKind::Answer => self.handle_remote_answer(&event).await,
                    ForwardKind::Candidate => self.handle_remote_candidate(&event).await,
                    ForwardKind::Signal => {
                        let data = data
                            .as_deref()
                            .map(|raw| {
                                serde_json::from_str::<String>(raw.get())
                                    .unwrap_or_else(|_| raw.get().to_string())
                            })
                            .unwrap_or_default();
                        self.emit(ClientEvent::Signal {
                            from: from.clone(),
                            data,
                        });
                    }
                }
            }
        }
    }

    async fn handle_notice(&mut self, notice: RelayNotice) {
        match notice {
            RelayNotice::ConnectionRequest { from } => {
                tracing::debug!("Ignoring connection request from {}", from);
            }
            RelayNotice::PeerDisconnected { name } => {
                tracing::info!("Peer {} left the relay", name);
                self.emit(ClientEvent::PeerDisconnected { name });
            }
            RelayNotice::Error { message } => {
                tracing::warn!("Relay error: {}", message);
                self.emit(ClientEvent::RelayError { message });
            }
            RelayNotice::TurnCredentials { data } => {
                match serde_json::from_str::<Credential>(&data) {
                    Ok(credential) => {
                        tracing::info!("Received relay credential for {}", credential.username);
                        let server = IceServerConfig::from(credential.clone());
                        if let Err(e) = self.peer.add_ice_servers(&[server]).await {
                            self.report_error("Failed to apply relay credential", e);
                        }
                        self.emit(ClientEvent::TurnCredentials(credential));
                    }
                    Err(e) => tracing::warn!("Dropping unreadable relay credential: {}", e),
                }
            }
        }
    }

    async fn forward<T: Serialize>(&self, kind: ForwardKind, payload: &T, with_name: bool) {
        let session = match kind {
            ForwardKind::Offer | ForwardKind::Answer => Some(self.session.clone()),
            ForwardKind::Candidate | ForwardKind::Signal => None,
        };
        let envelope = serde_json::to_string(payload)
            .map_err(ProtocolError::from)
            .and_then(|json| Envelope::forward(kind, &self.target, session, &json));

        match envelope {
            Ok(envelope) => {
                let envelope = if with_name {
                    envelope.with_name(self.name.as_str())
                } else {
                    envelope
                };
                if let Err(e) = self.transport.send(&envelope).await {
                    tracing::warn!("Failed to send {}: {}", kind.as_str(), e);
                }
            }
            Err(e) => tracing::error!("Failed to encode {}: {}", kind.as_str(), e),
        }
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::NegotiationNeeded => self.send_offer().await,
            PeerEvent::IceCandidate(candidate) => {
                tracing::trace!("Local candidate {}", candidate.candidate);
                self.forward(ForwardKind::Candidate, &candidate, true).await;
            }
            PeerEvent::StateChanged(state) => self.handle_peer_state(state).await,
            PeerEvent::Track(track) => {
                tracing::info!("Remote {} track {}", track.kind, track.id);
                self.emit(ClientEvent::Track(track));
            }
            PeerEvent::Channel { label, event } => self.handle_channel_event(&label, event),
        }
    }

    async fn create_local_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self.peer.create_offer().await?;
        self.peer.set_local_description(offer.clone()).await?;
        Ok(offer)
    }

    async fn send_offer(&mut self) {
        if self.current_status().is_terminal() {
            tracing::debug!("Skipping negotiation after session end");
            return;
        }
        match self.create_local_offer().await {
            Ok(offer) => {
                self.offer_pending = true;
                self.forward(ForwardKind::Offer, &offer, false).await;
                self.enter_negotiating();
            }
            Err(e) => self.report_error("Failed to create offer", e),
        }
    }

    async fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        self.peer.set_remote_description(offer).await?;
        self.has_remote_description = true;
        self.flush_candidates().await;
        let answer = self.peer.create_answer().await?;
        self.peer.set_local_description(answer.clone()).await?;
        Ok(answer)
    }

    async fn handle_remote_offer(&mut self, event: &RelayEvent) {
        let offer: SessionDescription = match event.payload() {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!("Dropping unreadable offer: {}", e);
                return;
            }
        };
        if !offer.is_offer() {
            tracing::warn!("Offer message carried a {:?} descriptor", offer.sdp_type);
            return;
        }

        self.enter_negotiating();
        match self.accept_offer(offer).await {
            Ok(answer) => self.forward(ForwardKind::Answer, &answer, false).await,
            Err(e) => self.report_error("Failed to answer offer", e),
        }
    }

    async fn handle_remote_answer(&mut self, event: &RelayEvent) {
        let answer: SessionDescription = match event.payload() {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Dropping unreadable answer: {}", e);
                return;
            }
        };
        if !answer.is_answer() {
            tracing::warn!("Answer message carried a {:?} descriptor", answer.sdp_type);
            return;
        }
        if !self.offer_pending {
            tracing::warn!("Ignoring answer with no pending offer");
            return;
        }

        match self.peer.set_remote_description(answer).await {
            Ok(()) => {
                self.offer_pending = false;
                self.has_remote_description = true;
                self.flush_candidates().await;
            }
            Err(e) => self.report_error("Failed to apply answer", e),
        }
    }

    async fn handle_remote_candidate(&mut self, event: &RelayEvent) {
        let candidate: IceCandidate = match event.payload() {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!("Dropping unreadable candidate: {}", e);
                return;
            }
        };

        if !self.has_remote_description {
            tracing::debug!("Buffering candidate until a remote description is set");
            self.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = self.peer.add_ice_candidate(candidate).await {
            tracing::warn!("Failed to apply remote candidate: {}", e);
        }
    }

    async fn flush_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.peer.add_ice_candidate(candidate).await {
                tracing::warn!("Failed to apply buffered candidate: {}", e);
            }
        }
    }

    async fn handle_peer_state(&mut self, state: PeerState) {
        tracing::info!("Peer connection {}", state);
        match state {
            PeerState::New | PeerState::Closed => {}
            PeerState::Connecting => self.set_status(ConnectionStatus::Connecting),
            PeerState::Connected => {
                self.connected_once = true;
                self.set_status(ConnectionStatus::Connected);
                if let Err(e) = self.mux.activate(self.peer.as_ref()).await {
                    self.report_error("Failed to open channels", e);
                }
            }
            PeerState::Disconnected => self.set_status(ConnectionStatus::Interrupted),
            PeerState::Failed => self.fail("Peer connection failed".to_string()),
        }
    }

    fn handle_channel_event(&self, label: &str, event: ChannelEvent) {
        match self.mux.handle_event(label, event) {
            MuxEvent::Opened(label) => {
                if label.variant == ChannelVariant::Terminal {
                    if let Some(session) = label.session_id.clone() {
                        self.schedule_initial_resize(session);
                    }
                }
                self.emit(ClientEvent::ChannelOpened(label));
            }
            MuxEvent::Closed(label) => self.emit(ClientEvent::ChannelClosed(label)),
            MuxEvent::TerminalOutput { session, data } => {
                self.emit(ClientEvent::TerminalOutput { session, data })
            }
            MuxEvent::ControlResponse(response) => match response.error() {
                Some(message) => {
                    tracing::warn!("Control request {} failed: {}", response.id, message);
                    self.emit(ClientEvent::ControlError {
                        id: response.id,
                        message: message.to_string(),
                    });
                }
                None => tracing::debug!("Control request {} acknowledged", response.id),
            },
            MuxEvent::VideoData { session, data } => {
                self.emit(ClientEvent::VideoData { session, data })
            }
            MuxEvent::Ignored => {}
        }
    }

    fn schedule_initial_resize(&self, session: String) {
        let timers = self.timers.clone();
        let delay = self.resize_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timers.send(Timer::InitialResize { session });
        });
    }

    async fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::InitialResize { session } => match self.mux.send_size(&session).await {
                Ok(()) => tracing::debug!("Sent initial size for {}", session),
                Err(e) => tracing::warn!("Initial resize for {} failed: {}", session, e),
            },
        }
    }
}
