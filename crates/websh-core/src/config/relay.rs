//! Relay configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::secs;

/// Configuration for the signaling relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the WebSocket listener to
    pub bind_address: String,

    /// Relay-assisted transport credentials; disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<TurnConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8002".to_string(),
            turn: None,
        }
    }
}

/// Shared-secret credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Secret shared with the TURN server
    pub secret: String,

    /// Credential lifetime
    #[serde(with = "secs")]
    pub ttl: Duration,

    /// TURN server URLs handed to clients along with the credential
    pub urls: Vec<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl: Duration::from_secs(86400),
            urls: Vec::new(),
        }
    }
}
