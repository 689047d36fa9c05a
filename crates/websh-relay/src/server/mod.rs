//! WebSocket server implementation

mod handler;
mod listener;

pub use handler::{ConnectionHandler, Flow};
pub use listener::RelayServer;
