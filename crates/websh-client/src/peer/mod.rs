//! Peer-connection primitive surface
//!
//! The negotiation actor treats the underlying ICE/SDP stack as a black box:
//! it issues commands through [`PeerConnection`] and consumes everything the
//! stack raises on its own as [`PeerEvent`]s from a single queue.

mod rtc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use websh_core::config::IceServerConfig;
use websh_core::error::{ChannelError, NegotiationError};
use websh_protocol::{IceCandidate, SessionDescription};

pub use rtc::{RtcDataChannel, RtcPeer, RtcTrack};

/// Connection state reported by the primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::New => write!(f, "new"),
            PeerState::Connecting => write!(f, "connecting"),
            PeerState::Connected => write!(f, "connected"),
            PeerState::Disconnected => write!(f, "disconnected"),
            PeerState::Failed => write!(f, "failed"),
            PeerState::Closed => write!(f, "closed"),
        }
    }
}

/// Lifecycle of one logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(Bytes),
    Closed,
}

/// Raw media arriving on an inbound track
#[async_trait]
pub trait MediaTrack: Send + Sync {
    /// Payload of the next media packet. Errors once the track has ended.
    async fn read(&self) -> Result<Bytes, ChannelError>;
}

/// An inbound media track
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    /// `audio` or `video`
    pub kind: String,
    pub stream_id: String,
    media: Arc<dyn MediaTrack>,
}

impl RemoteTrack {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        stream_id: impl Into<String>,
        media: Arc<dyn MediaTrack>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            stream_id: stream_id.into(),
            media,
        }
    }

    /// Read the next media payload
    pub async fn read(&self) -> Result<Bytes, ChannelError> {
        self.media.read().await
    }

    pub fn media(&self) -> Arc<dyn MediaTrack> {
        Arc::clone(&self.media)
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RemoteTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind && self.stream_id == other.stream_id
    }
}

/// Events raised asynchronously by the primitive
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A new offer is needed
    NegotiationNeeded,
    /// A local network candidate was discovered
    IceCandidate(IceCandidate),
    /// Overall connection state changed
    StateChanged(PeerState),
    /// A remote media track arrived
    Track(RemoteTrack),
    /// Something happened on the channel with this label
    Channel { label: String, event: ChannelEvent },
}

/// Commands accepted by the primitive
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    /// Append ICE servers to the live connection's configuration
    async fn add_ice_servers(&self, servers: &[IceServerConfig]) -> Result<(), NegotiationError>;

    /// Open a logical channel. Its events arrive as [`PeerEvent::Channel`].
    async fn create_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

/// One logical channel over the peer-to-peer transport
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn send(&self, data: Bytes) -> Result<(), ChannelError>;

    async fn close(&self) -> Result<(), ChannelError>;
}
