//! websh-client: Client side of a websh session
//!
//! The client registers with the signaling relay, pairs with a server
//! peer, drives a peer-connection primitive through offer/answer/candidate
//! exchange and multiplexes control, terminal and video channels over the
//! resulting transport.

pub mod mux;
pub mod negotiation;
pub mod peer;
pub mod signaling;

pub use negotiation::{ClientEvent, ConnectionManager};
pub use peer::{
    ChannelEvent, DataChannel, MediaTrack, PeerConnection, PeerEvent, PeerState, RemoteTrack,
};
pub use signaling::{SignalingTransport, WsSignaling};
