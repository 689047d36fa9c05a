//! Channel multiplexer
//!
//! Opens labeled logical channels over one peer-to-peer transport and
//! routes their traffic. The control channel exists from the start so that
//! creating it triggers the first negotiation; terminal channels are opened
//! once the transport is usable.

mod control;
mod terminal;
mod video;

use std::collections::HashMap;

use bytes::Bytes;

use websh_core::error::ChannelError;
use websh_core::WebshError;
use websh_protocol::{ChannelLabel, ChannelVariant, ControlBody, ControlResponse, TerminalSize};

use crate::peer::{ChannelEvent, PeerConnection};

pub use control::ControlChannel;
pub use terminal::TerminalChannel;
pub use video::VideoChannel;

/// Result of routing one channel event
#[derive(Debug, Clone, PartialEq)]
pub enum MuxEvent {
    Opened(ChannelLabel),
    Closed(ChannelLabel),
    TerminalOutput { session: String, data: String },
    ControlResponse(ControlResponse),
    VideoData { session: String, data: Bytes },
    Ignored,
}

/// All logical channels of one transport
pub struct ChannelMultiplexer {
    control: Option<ControlChannel>,
    terminals: HashMap<String, TerminalChannel>,
    videos: HashMap<String, VideoChannel>,
    /// Terminal sessions requested before activation
    pending_terminals: Vec<String>,
    active: bool,
    default_size: TerminalSize,
}

impl ChannelMultiplexer {
    pub fn new(default_size: TerminalSize) -> Self {
        Self {
            control: None,
            terminals: HashMap::new(),
            videos: HashMap::new(),
            pending_terminals: Vec::new(),
            active: false,
            default_size,
        }
    }

    /// Whether the transport has been reported usable
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Create the control channel
    pub async fn open_control(&mut self, peer: &dyn PeerConnection) -> Result<(), WebshError> {
        if self.control.is_some() {
            return Err(ChannelError::AlreadyOpen(ChannelLabel::control().to_string()).into());
        }
        let label = ChannelLabel::control().encode()?;
        let channel = peer.create_channel(&label).await?;
        self.control = Some(ControlChannel::new(channel));
        Ok(())
    }

    /// Mark the transport usable and open requested terminals
    pub async fn activate(&mut self, peer: &dyn PeerConnection) -> Result<(), WebshError> {
        if self.active {
            return Ok(());
        }
        self.active = true;
        tracing::info!("Channel multiplexer active");

        for session in std::mem::take(&mut self.pending_terminals) {
            self.create_terminal(peer, session).await?;
        }
        Ok(())
    }

    /// Open a terminal channel now, or on activation
    pub async fn open_terminal(
        &mut self,
        peer: &dyn PeerConnection,
        session: &str,
    ) -> Result<(), WebshError> {
        if self.terminals.contains_key(session)
            || self.pending_terminals.iter().any(|s| s == session)
        {
            return Err(
                ChannelError::AlreadyOpen(ChannelLabel::terminal(session).to_string()).into(),
            );
        }

        if !self.active {
            tracing::debug!("Terminal {} will open once connected", session);
            self.pending_terminals.push(session.to_string());
            return Ok(());
        }

        self.create_terminal(peer, session.to_string()).await
    }

    async fn create_terminal(
        &mut self,
        peer: &dyn PeerConnection,
        session: String,
    ) -> Result<(), WebshError> {
        let label = ChannelLabel::terminal(session.clone()).encode()?;
        let channel = peer.create_channel(&label).await?;
        tracing::info!("Opened terminal channel {}", session);
        self.terminals.insert(
            session.clone(),
            TerminalChannel::new(session, channel, self.default_size),
        );
        Ok(())
    }

    /// Open a video channel for `session`
    pub async fn open_video(
        &mut self,
        peer: &dyn PeerConnection,
        session: &str,
    ) -> Result<(), WebshError> {
        if self.videos.contains_key(session) {
            return Err(ChannelError::AlreadyOpen(ChannelLabel::video(session).to_string()).into());
        }
        let label = ChannelLabel::video(session).encode()?;
        let channel = peer.create_channel(&label).await?;
        tracing::info!("Opened video channel {}", session);
        self.videos
            .insert(session.to_string(), VideoChannel::new(session, channel));
        Ok(())
    }

    pub async fn send_control(&self, body: ControlBody) -> Result<u32, ChannelError> {
        match &self.control {
            Some(control) => control.send(body).await,
            None => Err(ChannelError::NotOpen(ChannelLabel::control().to_string())),
        }
    }

    fn terminal(&self, session: &str) -> Result<&TerminalChannel, ChannelError> {
        self.terminals
            .get(session)
            .ok_or_else(|| ChannelError::NotOpen(ChannelLabel::terminal(session).to_string()))
    }

    pub async fn send_input(&self, session: &str, text: &str) -> Result<(), ChannelError> {
        self.terminal(session)?.send_input(text).await
    }

    /// Send new geometry. Also becomes the size of terminals opened later.
    pub async fn resize(&mut self, session: &str, size: TerminalSize) -> Result<(), ChannelError> {
        self.default_size = size;
        match self.terminals.get_mut(session) {
            Some(terminal) => terminal.resize(size).await,
            None => Err(ChannelError::NotOpen(
                ChannelLabel::terminal(session).to_string(),
            )),
        }
    }

    /// Send the terminal's current geometry
    pub async fn send_size(&self, session: &str) -> Result<(), ChannelError> {
        self.terminal(session)?.send_size().await
    }

    /// Route an event raised on the channel labeled `label`
    pub fn handle_event(&self, label: &str, event: ChannelEvent) -> MuxEvent {
        let parsed = match ChannelLabel::parse(label) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::debug!("Event on unknown channel {}", label);
                return MuxEvent::Ignored;
            }
        };

        match event {
            ChannelEvent::Open => {
                tracing::info!("Channel {} open", parsed);
                MuxEvent::Opened(parsed)
            }
            ChannelEvent::Closed => {
                tracing::info!("Channel {} closed", parsed);
                MuxEvent::Closed(parsed)
            }
            ChannelEvent::Message(data) => self.route_message(parsed, data),
        }
    }

    fn route_message(&self, label: ChannelLabel, data: Bytes) -> MuxEvent {
        let session = label.session_id.clone().unwrap_or_default();
        match label.variant {
            ChannelVariant::Control => self
                .control
                .as_ref()
                .and_then(|c| c.decode(&data))
                .map_or(MuxEvent::Ignored, MuxEvent::ControlResponse),
            ChannelVariant::Terminal => match self.terminals.get(&session) {
                Some(terminal) => terminal
                    .decode_output(&data)
                    .map_or(MuxEvent::Ignored, |output| MuxEvent::TerminalOutput {
                        session,
                        data: output,
                    }),
                None => MuxEvent::Ignored,
            },
            ChannelVariant::Video => {
                if self.videos.contains_key(&session) {
                    MuxEvent::VideoData { session, data }
                } else {
                    MuxEvent::Ignored
                }
            }
        }
    }

    /// Close every channel. Failures are logged and do not stop the rest.
    pub async fn close_all(&mut self) {
        for (session, terminal) in self.terminals.drain() {
            if let Err(e) = terminal.close().await {
                tracing::warn!("Failed to close terminal {}: {}", session, e);
            }
        }
        for (session, video) in self.videos.drain() {
            if let Err(e) = video.close().await {
                tracing::warn!("Failed to close video {}: {}", session, e);
            }
        }
        if let Some(control) = self.control.take() {
            if let Err(e) = control.close().await {
                tracing::warn!("Failed to close control channel: {}", e);
            }
        }
        self.pending_terminals.clear();
        self.active = false;
    }
}
