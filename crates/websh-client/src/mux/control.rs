//! Control channel
//!
//! Ids come from a counter that starts at 0 and is incremented before each
//! send, so the first request carries id 1 and no id is ever reused.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use websh_core::error::ChannelError;
use websh_protocol::{ChannelLabel, ControlBody, ControlMsg, ControlResponse};

use crate::peer::DataChannel;

/// The singleton control channel of a transport
pub struct ControlChannel {
    channel: Arc<dyn DataChannel>,
    last_id: AtomicU32,
}

impl ControlChannel {
    pub fn new(channel: Arc<dyn DataChannel>) -> Self {
        Self {
            channel,
            last_id: AtomicU32::new(0),
        }
    }

    pub fn label(&self) -> ChannelLabel {
        ChannelLabel::control()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Send a request; returns the id it was sent with
    pub async fn send(&self, body: ControlBody) -> Result<u32, ChannelError> {
        if !self.channel.is_open() {
            return Err(ChannelError::NotOpen(self.label().to_string()));
        }

        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = ControlMsg::new(id, body)
            .encode()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        tracing::debug!("Sending control request {}", id);
        self.channel.send(Bytes::from(payload)).await?;
        Ok(id)
    }

    /// Decode an inbound response, logging anything unparseable
    pub fn decode(&self, data: &[u8]) -> Option<ControlResponse> {
        match ControlResponse::decode(data) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("Dropping unparseable control message: {}", e);
                None
            }
        }
    }

    pub async fn close(&self) -> Result<(), ChannelError> {
        self.channel.close().await
    }
}
