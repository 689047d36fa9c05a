//! websh-protocol: Wire protocol for websh
//!
//! This crate defines the JSON messages exchanged with the signaling relay
//! and the frames carried on the multiplexed peer-to-peer channels.

pub mod channel;
pub mod control;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod terminal;

pub use channel::{ChannelLabel, ChannelVariant};
pub use control::{ControlBody, ControlMsg, ControlResponse, ControlResponseBody, StartVideo};
pub use descriptor::{IceCandidate, SdpType, SessionDescription};
pub use envelope::{Envelope, ForwardKind, PeerKind, RelayEvent, RelayNotice, RelayRequest};
pub use error::ProtocolError;
pub use terminal::{TerminalFrame, TerminalSize};
