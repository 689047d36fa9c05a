//! Shared test doubles for the client
//!
//! `MockPeer` stands in for the peer-connection primitive and
//! `MemoryTransport` for the relay connection. Both record into one shared
//! journal so tests can assert the order of side effects.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use websh_client::{
    ChannelEvent, ClientEvent, ConnectionManager, DataChannel, MediaTrack, PeerConnection,
    PeerEvent, RemoteTrack, SignalingTransport,
};
use websh_core::config::{ClientConfig, IceServerConfig};
use websh_core::error::{ChannelError, NegotiationError};
use websh_core::ConnectionStatus;
use websh_protocol::{
    ChannelLabel, Envelope, IceCandidate, SdpType, SessionDescription, TerminalFrame,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct MockChannel {
    label: String,
    open: AtomicBool,
    sent: Mutex<Vec<Bytes>>,
    journal: Journal,
}

impl MockChannel {
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn sent_terminal_frames(&self) -> Vec<TerminalFrame> {
        self.sent()
            .iter()
            .map(|b| TerminalFrame::decode(b).unwrap())
            .collect()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect()
    }
}

#[async_trait]
impl DataChannel for MockChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, data: Bytes) -> Result<(), ChannelError> {
        self.sent.lock().push(data);
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.set_open(false);
        let label = ChannelLabel::parse(&self.label)
            .map(|l| l.to_string())
            .unwrap_or_else(|_| self.label.clone());
        self.journal.lock().push(format!("channel_close:{}", label));
        Ok(())
    }
}

pub struct MockPeer {
    journal: Journal,
    calls: Mutex<Vec<String>>,
    channels: Mutex<HashMap<String, Arc<MockChannel>>>,
    offers: AtomicU32,
    answers: AtomicU32,
}

impl MockPeer {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            calls: Mutex::new(Vec::new()),
            channels: Mutex::new(HashMap::new()),
            offers: AtomicU32::new(0),
            answers: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    pub fn channel(&self, label: &ChannelLabel) -> Option<Arc<MockChannel>> {
        self.channels.lock().get(&label.encode().unwrap()).cloned()
    }

    pub fn channel_labels(&self) -> Vec<ChannelLabel> {
        self.channels
            .lock()
            .keys()
            .map(|l| ChannelLabel::parse(l).unwrap())
            .collect()
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        self.record("create_offer".to_string());
        Ok(SessionDescription::new(SdpType::Offer, format!("local-offer-{}", n)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        self.record("create_answer".to_string());
        Ok(SessionDescription::new(SdpType::Answer, format!("local-answer-{}", n)))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.record(format!("set_local:{}", desc.sdp));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.record(format!("set_remote:{}", desc.sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.record(format!("add_candidate:{}", candidate.candidate));
        Ok(())
    }

    async fn add_ice_servers(&self, servers: &[IceServerConfig]) -> Result<(), NegotiationError> {
        for server in servers {
            self.record(format!(
                "add_ice_server:{}:{}",
                server.urls.join(","),
                server.username.as_deref().unwrap_or_default()
            ));
        }
        Ok(())
    }

    async fn create_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn DataChannel>, NegotiationError> {
        self.record(format!("create_channel:{}", label));
        let channel = Arc::new(MockChannel {
            label: label.to_string(),
            open: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            journal: Arc::clone(&self.journal),
        });
        self.channels
            .lock()
            .insert(label.to_string(), Arc::clone(&channel));
        Ok(channel)
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.record("close".to_string());
        self.journal.lock().push("peer_close".to_string());
        Ok(())
    }
}

/// Media track that replays queued payloads, then reports the track ended
pub struct MockTrack {
    packets: Mutex<VecDeque<Bytes>>,
}

impl MockTrack {
    pub fn remote(id: &str, kind: &str, packets: &[&str]) -> RemoteTrack {
        let track = Arc::new(Self {
            packets: Mutex::new(packets.iter().map(|p| Bytes::from(p.to_string())).collect()),
        });
        RemoteTrack::new(id, kind, "stream-0", track)
    }
}

#[async_trait]
impl MediaTrack for MockTrack {
    async fn read(&self) -> Result<Bytes, ChannelError> {
        self.packets
            .lock()
            .pop_front()
            .ok_or_else(|| ChannelError::Transport("track ended".to_string()))
    }
}

/// Relay stand-in that hands every sent envelope to the test
pub struct MemoryTransport {
    outbox: mpsc::UnboundedSender<Envelope>,
    journal: Journal,
    closes: AtomicU32,
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    async fn send(&self, envelope: &Envelope) -> Result<(), NegotiationError> {
        self.outbox
            .send(envelope.clone())
            .map_err(|_| NegotiationError::Signaling("outbox dropped".to_string()))
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push("transport_close".to_string());
        Ok(())
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        name: Some("alice".to_string()),
        target: "srv".to_string(),
        session: "main".to_string(),
        ice_servers: Vec::new(),
        resize_delay: Duration::from_secs(3600),
        ..ClientConfig::default()
    }
}

/// A running connection manager wired to mocks
pub struct Harness {
    pub manager: ConnectionManager,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    pub relay: Option<mpsc::Sender<String>>,
    pub outbox: mpsc::UnboundedReceiver<Envelope>,
    pub peer_events: mpsc::UnboundedSender<PeerEvent>,
    pub peer: Arc<MockPeer>,
    pub transport: Arc<MemoryTransport>,
    pub journal: Journal,
}

impl Harness {
    pub fn start(config: ClientConfig) -> Self {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let peer = MockPeer::new(Arc::clone(&journal));
        let (outbox_tx, outbox) = mpsc::unbounded_channel();
        let transport = Arc::new(MemoryTransport {
            outbox: outbox_tx,
            journal: Arc::clone(&journal),
            closes: AtomicU32::new(0),
        });
        let (relay, inbound) = mpsc::channel(64);
        let (peer_events, peer_events_rx) = mpsc::unbounded_channel();

        let (manager, events) = ConnectionManager::start(
            config,
            Arc::clone(&transport) as Arc<dyn SignalingTransport>,
            inbound,
            Arc::clone(&peer) as Arc<dyn PeerConnection>,
            peer_events_rx,
        );

        Self {
            manager,
            events,
            relay: Some(relay),
            outbox,
            peer_events,
            peer,
            transport,
            journal,
        }
    }

    pub fn transport_closes(&self) -> u32 {
        self.transport.closes.load(Ordering::SeqCst)
    }

    pub async fn next_envelope(&mut self) -> Envelope {
        timeout(WAIT, self.outbox.recv())
            .await
            .expect("Timed out waiting for an envelope")
            .expect("Outbox closed")
    }

    /// Skip the register and connect envelopes sent on startup
    pub async fn skip_handshake(&mut self) {
        assert_eq!(self.next_envelope().await.kind, "register");
        assert_eq!(self.next_envelope().await.kind, "connect");
    }

    pub async fn next_event(&mut self) -> ClientEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("Timed out waiting for an event")
            .expect("Event queue closed")
    }

    /// Next event matching `pred`, skipping the rest
    pub async fn event_matching(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
    }

    pub async fn wait_status(&self, status: ConnectionStatus) {
        let mut rx = self.manager.status();
        timeout(WAIT, rx.wait_for(|s| *s == status))
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for status {:?}", status))
            .expect("Status sender dropped");
    }

    /// Deliver a relay frame to the client
    pub async fn deliver(&self, frame: serde_json::Value) {
        self.relay
            .as_ref()
            .expect("Relay already closed")
            .send(frame.to_string())
            .await
            .expect("Client stopped reading relay frames");
    }

    pub fn raise(&self, event: PeerEvent) {
        self.peer_events.send(event).expect("Client stopped reading peer events");
    }

    /// Let the actor drain its queues
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pub async fn wait_until(&self, what: &str, cond: impl Fn() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting until {}", what);
    }

    /// Wait for the client to create a channel
    pub async fn channel(&self, label: &ChannelLabel) -> Arc<MockChannel> {
        let peer = Arc::clone(&self.peer);
        let wanted = label.clone();
        self.wait_until(&format!("channel {} exists", label), move || {
            peer.channel(&wanted).is_some()
        })
        .await;
        self.peer.channel(label).unwrap()
    }

    /// Mark a created channel open and report it
    pub async fn open_channel(&self, label: &ChannelLabel) -> Arc<MockChannel> {
        let channel = self.channel(label).await;
        channel.set_open(true);
        self.raise(PeerEvent::Channel {
            label: label.encode().unwrap(),
            event: ChannelEvent::Open,
        });
        channel
    }

    /// Report bytes arriving on a channel
    pub fn receive_on(&self, label: &ChannelLabel, data: &str) {
        self.raise(PeerEvent::Channel {
            label: label.encode().unwrap(),
            event: ChannelEvent::Message(Bytes::from(data.to_string())),
        });
    }

    /// Drive the mocks to a connected transport with the terminal open
    pub async fn connect(&mut self) -> Arc<MockChannel> {
        self.skip_handshake().await;
        self.manager.open_terminal("main").await.unwrap();
        self.raise(PeerEvent::StateChanged(websh_client::PeerState::Connected));
        self.wait_status(ConnectionStatus::Connected).await;
        self.open_channel(&ChannelLabel::control()).await;
        self.open_channel(&ChannelLabel::terminal("main")).await
    }
}

/// A forwarded descriptor as the relay delivers it
pub fn descriptor_frame(kind: &str, from: &str, sdp_type: SdpType, sdp: &str) -> serde_json::Value {
    let desc = SessionDescription::new(sdp_type, sdp);
    serde_json::json!({
        "type": kind,
        "from": from,
        "session": "main",
        "data": serde_json::to_string(&desc).unwrap(),
    })
}

pub fn candidate_frame(from: &str, candidate: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "candidate",
        "from": from,
        "data": serde_json::to_string(&IceCandidate::new(candidate)).unwrap(),
    })
}
