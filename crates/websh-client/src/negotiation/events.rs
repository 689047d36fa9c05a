//! Caller-facing events and actor commands

use tokio::sync::oneshot;

use bytes::Bytes;
use websh_core::{Credential, WebshError};
use websh_protocol::{ChannelLabel, ControlBody, StartVideo, TerminalSize};

use crate::peer::RemoteTrack;

/// Notifications delivered to the owner of a [`ConnectionManager`](super::ConnectionManager)
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The relay rejected a request
    RelayError { message: String },
    /// The paired peer left the relay
    PeerDisconnected { name: String },
    /// The relay connection dropped
    RelayClosed,
    /// Relay-assisted transport credential
    TurnCredentials(Credential),
    /// Free-form `signal` payload from a peer
    Signal { from: String, data: String },
    /// A negotiation step failed; the session may still recover
    NegotiationError { message: String },
    /// The session cannot continue
    Failed { reason: String },
    ChannelOpened(ChannelLabel),
    ChannelClosed(ChannelLabel),
    TerminalOutput { session: String, data: String },
    /// The remote side rejected a control request
    ControlError { id: u32, message: String },
    VideoData { session: String, data: Bytes },
    Track(RemoteTrack),
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, WebshError>>;

/// Requests from the manager handle to the actor
pub(crate) enum Command {
    SendInput {
        session: String,
        text: String,
        reply: Reply<()>,
    },
    Resize {
        session: String,
        size: TerminalSize,
        reply: Reply<()>,
    },
    SendControl {
        body: ControlBody,
        reply: Reply<u32>,
    },
    StartVideo {
        request: StartVideo,
        reply: Reply<u32>,
    },
    OpenTerminal {
        session: String,
        reply: Reply<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Work the actor schedules for itself
#[derive(Debug)]
pub(crate) enum Timer {
    /// Send the first geometry of a freshly opened terminal
    InitialResize { session: String },
}
