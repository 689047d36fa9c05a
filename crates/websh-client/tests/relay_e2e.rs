//! Client against a real relay
//!
//! The server side is a bare WebSocket client speaking the relay protocol;
//! the client side is a full connection manager over `WsSignaling`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use common::{test_config, MockPeer, WAIT};
use websh_client::{ClientEvent, ConnectionManager, PeerEvent, WsSignaling};
use websh_core::config::RelayConfig;
use websh_core::ConnectionStatus;
use websh_protocol::{Envelope, IceCandidate, SdpType, SessionDescription};
use websh_relay::{RelayServer, RelayState};

async fn start_relay() -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(RelayState::new(RelayConfig::default()));
    let cancel = CancellationToken::new();
    let server = RelayServer::new(state, cancel.clone());
    tokio::spawn(async move { server.serve(listener).await });
    (format!("ws://{}/signal", addr), cancel)
}

struct ServerPeer {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ServerPeer {
    async fn register(url: &str, name: &str) -> Self {
        let (mut ws, _) = connect_async(url).await.unwrap();
        let register = Envelope::register(name, websh_protocol::PeerKind::Server);
        ws.send(Message::Text(register.to_json().unwrap()))
            .await
            .unwrap();
        Self { ws }
    }

    async fn send(&mut self, envelope: Envelope) {
        self.ws
            .send(Message::Text(envelope.to_json().unwrap()))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Envelope {
        loop {
            let msg = timeout(WAIT, self.ws.next())
                .await
                .expect("Timed out waiting for relay message")
                .expect("Relay closed the connection")
                .unwrap();
            if let Message::Text(text) = msg {
                return Envelope::parse(&text).unwrap();
            }
        }
    }
}

async fn wait_for_call(peer: &MockPeer, call: &str) {
    for _ in 0..500 {
        if peer.calls().iter().any(|c| c == call) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("peer never saw {}", call);
}

#[tokio::test]
async fn test_negotiation_through_relay() {
    let (url, cancel) = start_relay().await;
    let mut server = ServerPeer::register(&url, "srv").await;
    // Registration has no acknowledgement; give the relay a moment
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut config = test_config();
    config.relay_url = url.clone();
    let (transport, inbound) = WsSignaling::connect(&config.relay_url).await.unwrap();
    let peer = MockPeer::new(Arc::new(Mutex::new(Vec::new())));
    let (peer_events, peer_events_rx) = mpsc::unbounded_channel();
    let (manager, mut events) = ConnectionManager::start(
        config,
        Arc::new(transport),
        inbound,
        Arc::clone(&peer) as Arc<dyn websh_client::PeerConnection>,
        peer_events_rx,
    );

    let request = server.recv().await;
    assert_eq!(request.kind, "connection_request");
    assert_eq!(request.from.as_deref(), Some("alice"));

    peer_events.send(PeerEvent::NegotiationNeeded).unwrap();
    let offer = server.recv().await;
    assert_eq!(offer.kind, "offer");
    assert_eq!(offer.from.as_deref(), Some("alice"));
    assert_eq!(offer.session.as_deref(), Some("main"));
    let desc: SessionDescription = offer.data_as().unwrap();
    assert_eq!(desc.sdp, "local-offer-1");

    let answer = SessionDescription::new(SdpType::Answer, "server-answer");
    let answer_json = serde_json::to_string(&answer).unwrap();
    server
        .send(
            Envelope::forward(
                websh_protocol::ForwardKind::Answer,
                "alice",
                Some("main".to_string()),
                &answer_json,
            )
            .unwrap(),
        )
        .await;
    wait_for_call(&peer, "set_remote:server-answer").await;

    let candidate = serde_json::to_string(&IceCandidate::new("candidate:srv-1")).unwrap();
    server
        .send(
            Envelope::forward(websh_protocol::ForwardKind::Candidate, "alice", None, &candidate)
                .unwrap()
                .with_name("srv"),
        )
        .await;
    wait_for_call(&peer, "add_candidate:candidate:srv-1").await;

    manager.close().await.unwrap();
    assert_eq!(manager.current_status(), ConnectionStatus::Disconnected);

    let gone = server.recv().await;
    assert_eq!(gone.kind, "peer_disconnected");
    assert_eq!(gone.name.as_deref(), Some("alice"));

    // The manager stopped; its event queue ends
    while let Ok(Some(event)) = timeout(WAIT, events.recv()).await {
        assert!(!matches!(event, ClientEvent::Failed { .. }));
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_unknown_target_reported() {
    let (url, cancel) = start_relay().await;

    let mut config = test_config();
    config.relay_url = url;
    config.target = "nobody".to_string();
    let (transport, inbound) = WsSignaling::connect(&config.relay_url).await.unwrap();
    let peer = MockPeer::new(Arc::new(Mutex::new(Vec::new())));
    let (_peer_events, peer_events_rx) = mpsc::unbounded_channel();
    let (manager, mut events) = ConnectionManager::start(
        config,
        Arc::new(transport),
        inbound,
        peer as Arc<dyn websh_client::PeerConnection>,
        peer_events_rx,
    );

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(
        event,
        ClientEvent::RelayError {
            message: "Target not found".to_string()
        }
    );

    manager.close().await.unwrap();
    cancel.cancel();
}

#[tokio::test]
async fn test_relay_shutdown_reported() {
    let (url, cancel) = start_relay().await;

    let mut config = test_config();
    config.relay_url = url;
    let (transport, inbound) = WsSignaling::connect(&config.relay_url).await.unwrap();
    let peer = MockPeer::new(Arc::new(Mutex::new(Vec::new())));
    let (_peer_events, peer_events_rx) = mpsc::unbounded_channel();
    let (manager, mut events) = ConnectionManager::start(
        config,
        Arc::new(transport),
        inbound,
        peer as Arc<dyn websh_client::PeerConnection>,
        peer_events_rx,
    );
    let mut status = manager.status();

    // srv is not registered, so the relay answers with an error first
    let first = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(first, ClientEvent::RelayError { .. }));

    cancel.cancel();
    let closed = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(closed, ClientEvent::RelayClosed);
    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Failed))
        .await
        .unwrap()
        .unwrap();
}
