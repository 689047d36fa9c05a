//! Core error types for websh

use std::path::PathBuf;
use thiserror::Error;
use websh_protocol::ProtocolError;

/// Top-level error type for the websh ecosystem
#[derive(Error, Debug)]
pub enum WebshError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Negotiation error
    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Peer registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live peer already holds the name
    #[error("Name already taken: {0}")]
    DuplicateName(String),

    /// Peer is not registered
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),
}

/// Logical channel errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Send attempted before open or after close
    #[error("Channel not open: {0}")]
    NotOpen(String),

    /// A channel with the same label already exists
    #[error("Channel already open: {0}")]
    AlreadyOpen(String),

    /// The underlying transport rejected the operation
    #[error("Channel transport error: {0}")]
    Transport(String),
}

/// Client-side negotiation errors
#[derive(Error, Debug)]
pub enum NegotiationError {
    /// Peer-connection primitive failed
    #[error("Peer connection error: {0}")]
    Peer(String),

    /// Signaling transport failed
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Relay message could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection manager has already shut down
    #[error("Connection closed")]
    Closed,

    /// The transport did not converge within the configured deadline
    #[error("Negotiation timed out")]
    Timeout,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Credential issuance errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Shared secret is empty or unusable
    #[error("Invalid shared secret")]
    InvalidSecret,
}
