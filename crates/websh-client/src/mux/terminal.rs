//! Terminal channels

use std::sync::Arc;

use websh_core::error::ChannelError;
use websh_protocol::{ChannelLabel, TerminalFrame, TerminalSize};

use crate::peer::DataChannel;

/// I/O channel of one remote shell session
pub struct TerminalChannel {
    session: String,
    channel: Arc<dyn DataChannel>,
    size: TerminalSize,
}

impl TerminalChannel {
    pub fn new(session: impl Into<String>, channel: Arc<dyn DataChannel>, size: TerminalSize) -> Self {
        Self {
            session: session.into(),
            channel,
            size,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn label(&self) -> ChannelLabel {
        ChannelLabel::terminal(self.session.clone())
    }

    /// Last known local geometry
    pub fn size(&self) -> TerminalSize {
        self.size
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    async fn send_frame(&self, frame: TerminalFrame) -> Result<(), ChannelError> {
        if !self.channel.is_open() {
            return Err(ChannelError::NotOpen(self.label().to_string()));
        }
        let bytes = frame
            .encode()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        self.channel.send(bytes).await
    }

    /// Send keystrokes
    pub async fn send_input(&self, text: &str) -> Result<(), ChannelError> {
        self.send_frame(TerminalFrame::Input(text.to_string())).await
    }

    /// Record and send new geometry. Repeated sizes are sent again.
    pub async fn resize(&mut self, size: TerminalSize) -> Result<(), ChannelError> {
        self.size = size;
        self.send_frame(TerminalFrame::Resize(size)).await
    }

    /// Re-send the current geometry
    pub async fn send_size(&self) -> Result<(), ChannelError> {
        self.send_frame(TerminalFrame::Resize(self.size)).await
    }

    /// Extract shell output from an inbound frame
    pub fn decode_output(&self, data: &[u8]) -> Option<String> {
        match TerminalFrame::decode(data) {
            Ok(TerminalFrame::Output(output)) => Some(output),
            Ok(other) => {
                tracing::debug!("Ignoring inbound {:?} on terminal {}", other, self.session);
                None
            }
            Err(e) => {
                tracing::warn!("Dropping unparseable frame on terminal {}: {}", self.session, e);
                None
            }
        }
    }

    pub async fn close(&self) -> Result<(), ChannelError> {
        self.channel.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::fake::FakeChannel;

    #[tokio::test]
    async fn test_resize_twice_is_accepted() {
        let fake = FakeChannel::new("t", true);
        let mut term = TerminalChannel::new("main", fake.clone(), TerminalSize::default());

        term.resize(TerminalSize::new(30, 100)).await.unwrap();
        term.resize(TerminalSize::new(30, 100)).await.unwrap();

        let sent = fake.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(term.size(), TerminalSize::new(30, 100));
    }

    #[tokio::test]
    async fn test_input_before_open_fails() {
        let fake = FakeChannel::new("t", false);
        let term = TerminalChannel::new("main", fake.clone(), TerminalSize::default());

        let err = term.send_input("ls\n").await.unwrap_err();
        assert_eq!(
            err,
            ChannelError::NotOpen(r#"terminal:main"#.to_string())
        );
        assert!(fake.sent().is_empty());
    }

    #[tokio::test]
    async fn test_input_after_close_fails() {
        let fake = FakeChannel::new("t", true);
        let term = TerminalChannel::new("main", fake.clone(), TerminalSize::default());
        term.send_input("a").await.unwrap();

        term.close().await.unwrap();
        assert!(matches!(
            term.send_input("b").await,
            Err(ChannelError::NotOpen(_))
        ));
    }

    #[test]
    fn test_decode_output() {
        let term = TerminalChannel::new("main", FakeChannel::new("t", true), TerminalSize::default());
        assert_eq!(term.decode_output(br#"{"output":"hi"}"#).as_deref(), Some("hi"));
        assert_eq!(term.decode_output(br#"{"input":"hi"}"#), None);
        assert_eq!(term.decode_output(b"garbage"), None);
    }
}
