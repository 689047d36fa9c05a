//! Control channel messages
//!
//! The control channel carries `{id, body}` requests for out-of-band session
//! management. Bodies are externally tagged (`"Empty"`,
//! `{"StartVideo": {...}}`), matching what the shell side decodes.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Request to start a video sub-session
///
/// Field names are snake_case on the wire; camelCase is accepted inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVideo {
    #[serde(alias = "displayId")]
    pub display_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(
        default,
        alias = "refreshRate",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_rate: Option<u32>,
}

impl StartVideo {
    pub fn new(display_id: u32) -> Self {
        Self {
            display_id,
            width: None,
            height: None,
            refresh_rate: None,
        }
    }
}

/// Body of a control request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlBody {
    /// No-op, useful for liveness checks
    Empty,
    /// Open a video session on the given display
    StartVideo(StartVideo),
}

/// `{id, body}` control request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMsg {
    pub id: u32,
    pub body: ControlBody,
}

impl ControlMsg {
    pub fn new(id: u32, body: ControlBody) -> Self {
        Self { id, body }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of a control response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponseBody {
    Empty,
    Error { msg: String },
}

/// `{id, body}` response to the request with the same id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub id: u32,
    pub body: ControlResponseBody,
}

impl ControlResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Malformed)
    }

    /// Error text, if the request failed
    pub fn error(&self) -> Option<&str> {
        match &self.body {
            ControlResponseBody::Error { msg } => Some(msg),
            ControlResponseBody::Empty => None,
        }
    }
}
