//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::secs;
use crate::credentials::Credential;
use crate::error::ConfigError;
use crate::types::PeerName;

/// Configuration for a user client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the signaling relay
    pub relay_url: String,

    /// Name to register under; a UUID is generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Server peer to connect to
    pub target: String,

    /// Terminal session to open on the server
    pub session: String,

    /// STUN/TURN servers for the peer connection
    pub ice_servers: Vec<IceServerConfig>,

    /// Delay between terminal channel open and the first resize
    #[serde(with = "secs")]
    pub resize_delay: Duration,

    /// Give up when the transport is not connected in time
    #[serde(
        with = "secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub negotiation_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8002".to_string(),
            name: None,
            target: String::new(),
            session: "main".to_string(),
            ice_servers: vec![IceServerConfig::default()],
            resize_delay: Duration::from_secs(5),
            negotiation_timeout: None,
        }
    }
}

impl ClientConfig {
    /// The configured name, or a freshly generated one
    pub fn peer_name(&self) -> PeerName {
        match &self.name {
            Some(name) => PeerName::new(name.clone()),
            None => PeerName::generate(),
        }
    }

    /// Check fields that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.is_empty() {
            return Err(ConfigError::MissingField("target".to_string()));
        }
        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(ConfigError::Invalid(format!(
                "relay_url must be a ws:// or wss:// URL: {}",
                self.relay_url
            )));
        }
        Ok(())
    }
}

/// One ICE server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl Default for IceServerConfig {
    fn default() -> Self {
        Self {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            username: None,
            credential: None,
        }
    }
}

impl From<Credential> for IceServerConfig {
    fn from(credential: Credential) -> Self {
        Self {
            urls: credential.urls,
            username: Some(credential.username),
            credential: Some(credential.password),
        }
    }
}
