//! Peer registry and pairing table

mod pairing;
mod peers;

pub use pairing::PairingTable;
pub use peers::{ConnectionId, Outbound, PeerHandle, PeerRegistry, Removed};
