//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

pub use websh_protocol::PeerKind;

/// Name a peer registers under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerName(pub String);

impl PeerName {
    /// Create a new peer name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generate a unique name for a user peer
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the raw name string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Externally observable status of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Not started yet
    Idle,
    /// `register` sent
    Registering,
    /// `connect` sent, waiting for the first descriptor
    AwaitingPairing,
    /// Offer/answer exchange in progress
    Negotiating,
    /// Transport is being established
    Connecting,
    /// Transport is usable
    Connected,
    /// Transport dropped; it may recover
    Interrupted,
    /// Negotiation or transport failed
    Failed,
    /// Closed by the caller
    Disconnected,
}

impl ConnectionStatus {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionStatus::Failed | ConnectionStatus::Disconnected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "starting"),
            ConnectionStatus::Registering => write!(f, "registering"),
            ConnectionStatus::AwaitingPairing => write!(f, "awaiting pairing"),
            ConnectionStatus::Negotiating => write!(f, "negotiating"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Interrupted => write!(f, "disconnected"),
            ConnectionStatus::Failed => write!(f, "failed"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_unique() {
        let a = PeerName::generate();
        let b = PeerName::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_connection_status_display() {
        assert_eq!(format!("{}", ConnectionStatus::Connected), "connected");
        assert_eq!(
            format!("{}", ConnectionStatus::AwaitingPairing),
            "awaiting pairing"
        );
        assert_eq!(format!("{}", ConnectionStatus::Disconnected), "Disconnected");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ConnectionStatus::Disconnected.is_terminal());
        assert!(ConnectionStatus::Failed.is_terminal());
        assert!(!ConnectionStatus::Interrupted.is_terminal());
    }
}
