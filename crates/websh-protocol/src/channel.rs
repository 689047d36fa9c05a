//! Logical channel labels
//!
//! Each logical channel opened over the peer-to-peer transport is labeled
//! with a serialized `{variant, sessionId}` descriptor, so the remote side can
//! demultiplex by inspecting the label alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Kind of logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelVariant {
    /// Singleton out-of-band command channel
    Control,
    /// Remote shell I/O
    Terminal,
    /// Raw media
    Video,
}

impl fmt::Display for ChannelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelVariant::Control => write!(f, "control"),
            ChannelVariant::Terminal => write!(f, "terminal"),
            ChannelVariant::Video => write!(f, "video"),
        }
    }
}

/// Identifies one logical channel: `{variant, sessionId}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLabel {
    pub variant: ChannelVariant,
    pub session_id: Option<String>,
}

impl ChannelLabel {
    /// The control channel label (`sessionId = null`)
    pub fn control() -> Self {
        Self {
            variant: ChannelVariant::Control,
            session_id: None,
        }
    }

    /// Label for a terminal session
    pub fn terminal(session_id: impl Into<String>) -> Self {
        Self {
            variant: ChannelVariant::Terminal,
            session_id: Some(session_id.into()),
        }
    }

    /// Label for a video session
    pub fn video(session_id: impl Into<String>) -> Self {
        Self {
            variant: ChannelVariant::Video,
            session_id: Some(session_id.into()),
        }
    }

    /// Serialized form used as the transport-level channel label
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a transport-level channel label
    pub fn parse(label: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(label).map_err(ProtocolError::Malformed)
    }
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_id {
            Some(id) => write!(f, "{}:{}", self.variant, id),
            None => write!(f, "{}", self.variant),
        }
    }
}
