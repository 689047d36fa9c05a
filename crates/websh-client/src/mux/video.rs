//! Video channels
//!
//! Video channels carry raw media with no JSON framing; inbound payloads
//! are handed to the caller untouched.

use std::sync::Arc;

use websh_core::error::ChannelError;
use websh_protocol::ChannelLabel;

use crate::peer::DataChannel;

/// Media channel of one video session
pub struct VideoChannel {
    session: String,
    channel: Arc<dyn DataChannel>,
}

impl VideoChannel {
    pub fn new(session: impl Into<String>, channel: Arc<dyn DataChannel>) -> Self {
        Self {
            session: session.into(),
            channel,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn label(&self) -> ChannelLabel {
        ChannelLabel::video(self.session.clone())
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub async fn close(&self) -> Result<(), ChannelError> {
        self.channel.close().await
    }
}
