//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding protocol messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload is not valid JSON for the expected shape
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A field required by the message type is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but carries an unsupported value
    #[error("Invalid value for field {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    /// Envelope `type` not recognized
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Whether this error means the input should be dropped without a reply
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::Malformed(_)
                | ProtocolError::MissingField(_)
                | ProtocolError::InvalidField { .. }
        )
    }
}
