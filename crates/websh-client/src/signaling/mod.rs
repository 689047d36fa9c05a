//! Signaling transport
//!
//! The negotiation actor sends envelopes through a [`SignalingTransport`] and
//! receives raw relay text frames from an mpsc queue. The queue closing means
//! the relay connection is gone.

mod ws;

use async_trait::async_trait;

use websh_core::error::NegotiationError;
use websh_protocol::Envelope;

pub use ws::WsSignaling;

/// Outbound half of a relay connection
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Send one envelope to the relay
    async fn send(&self, envelope: &Envelope) -> Result<(), NegotiationError>;

    /// Close the relay connection
    async fn close(&self) -> Result<(), NegotiationError>;
}
