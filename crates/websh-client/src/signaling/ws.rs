//! WebSocket signaling transport

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use websh_core::error::NegotiationError;
use websh_protocol::Envelope;

use super::SignalingTransport;

/// Relay connection over a WebSocket
pub struct WsSignaling {
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsSignaling {
    /// Connect to the relay at `url`; returns the transport and the queue of
    /// inbound text frames
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<String>), NegotiationError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| NegotiationError::Signaling(format!("Failed to connect to {}: {}", url, e)))?;

        tracing::info!("Connected to relay at {}", url);

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound) = mpsc::channel::<String>(256);

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::warn!("Relay send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Relay receive error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok((Self { outbound }, inbound))
    }
}

#[async_trait]
impl SignalingTransport for WsSignaling {
    async fn send(&self, envelope: &Envelope) -> Result<(), NegotiationError> {
        let json = envelope.to_json()?;
        self.outbound
            .send(Message::Text(json))
            .map_err(|_| NegotiationError::Signaling("Relay connection closed".to_string()))
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.outbound
            .send(Message::Close(None))
            .map_err(|_| NegotiationError::Signaling("Relay connection already closed".to_string()))
    }
}
