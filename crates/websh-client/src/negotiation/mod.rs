//! Negotiation state machine
//!
//! One actor task owns the peer connection, the relay transport and the
//! channel multiplexer. Relay frames, primitive events, caller commands and
//! timers are consumed one at a time from their queues, so negotiation state
//! is never mutated concurrently.

mod events;
mod machine;
mod manager;

pub use events::ClientEvent;
pub use manager::ConnectionManager;
