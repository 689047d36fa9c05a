//! websh-relay: Signaling relay for websh
//!
//! The relay accepts WebSocket connections from user and server peers,
//! keeps a registry of their names, pairs them on request and forwards
//! negotiation messages between partners without interpreting them.

pub mod registry;
pub mod server;
pub mod state;

pub use registry::PeerRegistry;
pub use server::RelayServer;
pub use state::RelayState;
