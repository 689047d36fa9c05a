//! Relay listener
//!
//! Accepts HTTP connections, upgrades them to WebSockets and runs a
//! [`ConnectionHandler`] for each one. Requests without an upgrade are
//! answered with `501 Not Implemented`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::registry::{Outbound, PeerHandle};
use crate::server::handler::{ConnectionHandler, Flow};
use crate::state::RelayState;

/// WebSocket signaling server
pub struct RelayServer {
    /// Shared relay state
    state: Arc<RelayState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

#[derive(Clone)]
struct ServerContext {
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

impl RelayServer {
    /// Create a new relay server
    pub fn new(state: Arc<RelayState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Router accepting upgrades on any path
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(upgrade_handler)
            .with_state(ServerContext {
                state: Arc::clone(&self.state),
                cancel: self.cancel.clone(),
            })
    }

    /// Bind `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Relay listening on {}", local_addr);

        let cancel = self.cancel.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Relay server failed")?;

        tracing::info!("Relay server shut down");
        Ok(())
    }
}

async fn upgrade_handler(
    State(ctx): State<ServerContext>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(move |socket| handle_socket(socket, ctx, remote)),
        None => {
            tracing::debug!("Rejecting non-upgrade request from {}", remote);
            StatusCode::NOT_IMPLEMENTED.into_response()
        }
    }
}

/// Drive one WebSocket connection to completion
async fn handle_socket(socket: WebSocket, ctx: ServerContext, remote: SocketAddr) {
    let conn_id = ctx.state.next_connection_id();
    tracing::info!("New connection {} from {}", conn_id, remote);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    // Writer: drains the outbound queue so enqueues never wait on the socket
    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Text(text) => {
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut handler = ConnectionHandler::new(Arc::clone(&ctx.state), PeerHandle::new(conn_id, tx));

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                tracing::debug!("Connection {} cancelled", conn_id);
                break;
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if handler.handle_text(&text) == Flow::Close {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("Connection {} sent a binary frame, ignoring", conn_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Connection {} receive error: {}", conn_id, e);
                        break;
                    }
                }
            }
        }
    }

    handler.cleanup();
    handler.handle().close();
    drop(handler);

    if let Err(e) = writer.await {
        tracing::warn!("Writer for connection {} failed: {}", conn_id, e);
    }

    tracing::info!("Connection {} from {} closed", conn_id, remote);
}
