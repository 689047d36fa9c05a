//! WebRTC adapter
//!
//! Wraps a `webrtc` peer connection so that every callback it raises is
//! forwarded into the negotiation actor's event queue.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

use websh_core::config::IceServerConfig;
use websh_core::error::{ChannelError, NegotiationError};
use websh_protocol::{IceCandidate, SdpType, SessionDescription};

use super::{
    ChannelEvent, DataChannel, MediaTrack, PeerConnection, PeerEvent, PeerState, RemoteTrack,
};

fn peer_err(context: &str, e: impl std::fmt::Display) -> NegotiationError {
    NegotiationError::Peer(format!("{}: {}", context, e))
}

/// Peer connection backed by the `webrtc` crate
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

impl RtcPeer {
    /// Create a peer connection and the queue its events are delivered on
    pub async fn new(
        ice_servers: &[IceServerConfig],
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<PeerEvent>), NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| peer_err("Failed to register codecs", e))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| peer_err("Failed to register interceptors", e))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let pc = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| peer_err("Failed to create peer connection", e))?;

        let (events, events_rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Self {
            pc: Arc::new(pc),
            events,
        });
        peer.setup_event_handlers();

        Ok((peer, events_rx))
    }

    fn setup_event_handlers(&self) {
        let events = self.events.clone();
        self.pc.on_negotiation_needed(Box::new(move || {
            let _ = events.send(PeerEvent::NegotiationNeeded);
            Box::pin(async {})
        }));

        let events = self.events.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                // None marks the end of gathering
                if let Some(candidate) = candidate {
                    match candidate.to_json() {
                        Ok(init) => {
                            let _ = events.send(PeerEvent::IceCandidate(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            }));
                        }
                        Err(e) => tracing::warn!("Failed to serialize local candidate: {}", e),
                    }
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let state = match s {
                    RTCPeerConnectionState::New => Some(PeerState::New),
                    RTCPeerConnectionState::Connecting => Some(PeerState::Connecting),
                    RTCPeerConnectionState::Connected => Some(PeerState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(PeerState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(PeerState::Failed),
                    RTCPeerConnectionState::Closed => Some(PeerState::Closed),
                    _ => None,
                };
                if let Some(state) = state {
                    let _ = events.send(PeerEvent::StateChanged(state));
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let remote = RemoteTrack::new(
                    track.id(),
                    track.kind().to_string(),
                    track.stream_id(),
                    Arc::new(RtcTrack { track }),
                );
                let _ = events.send(PeerEvent::Track(remote));
                Box::pin(async {})
            }));

        self.pc.on_data_channel(Box::new(|dc: Arc<RTCDataChannel>| {
            tracing::debug!("Ignoring remotely opened channel {}", dc.label());
            Box::pin(async {})
        }));
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, NegotiationError> {
    let result = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(NegotiationError::Peer(
                "Rollback descriptions are not supported".to_string(),
            ))
        }
    };
    result.map_err(|e| peer_err("Invalid session description", e))
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, NegotiationError> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => {
            return Err(NegotiationError::Peer(format!(
                "Unexpected description type {}",
                other
            )))
        }
    };
    Ok(SessionDescription::new(sdp_type, desc.sdp))
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| peer_err("Failed to create offer", e))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| peer_err("Failed to create answer", e))?;
        from_rtc(answer)
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| peer_err("Failed to set local description", e))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| peer_err("Failed to set remote description", e))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| peer_err("Failed to add ICE candidate", e))
    }

    async fn add_ice_servers(&self, servers: &[IceServerConfig]) -> Result<(), NegotiationError> {
        let mut config = self.pc.get_configuration().await;
        for server in servers {
            // A fresh credential for the same relay replaces the old one
            config.ice_servers.retain(|s| s.urls != server.urls);
            config.ice_servers.push(to_rtc_ice_server(server));
        }
        self.pc
            .set_configuration(config)
            .await
            .map_err(|e| peer_err("Failed to update ICE servers", e))
    }

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, NegotiationError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| peer_err("Failed to create data channel", e))?;

        let events = self.events.clone();
        let name = label.to_string();
        dc.on_open(Box::new(move || {
            let _ = events.send(PeerEvent::Channel {
                label: name,
                event: ChannelEvent::Open,
            });
            Box::pin(async {})
        }));

        let events = self.events.clone();
        let name = label.to_string();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let _ = events.send(PeerEvent::Channel {
                label: name.clone(),
                event: ChannelEvent::Message(msg.data),
            });
            Box::pin(async {})
        }));

        let events = self.events.clone();
        let name = label.to_string();
        dc.on_close(Box::new(move || {
            let _ = events.send(PeerEvent::Channel {
                label: name.clone(),
                event: ChannelEvent::Closed,
            });
            Box::pin(async {})
        }));

        tracing::debug!("Data channel {} created", label);
        Ok(Arc::new(RtcDataChannel { dc }))
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.pc
            .close()
            .await
            .map_err(|e| peer_err("Failed to close peer connection", e))
    }
}

/// Data channel backed by the `webrtc` crate
pub struct RtcDataChannel {
    dc: Arc<RTCDataChannel>,
}

#[async_trait]
impl DataChannel for RtcDataChannel {
    fn label(&self) -> &str {
        self.dc.label()
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    async fn send(&self, data: Bytes) -> Result<(), ChannelError> {
        self.dc
            .send(&data)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.dc
            .close()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

/// Inbound media track backed by the `webrtc` crate
pub struct RtcTrack {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl MediaTrack for RtcTrack {
    async fn read(&self) -> Result<Bytes, ChannelError> {
        let (packet, _) = self
            .track
            .read_rtp()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(packet.payload)
    }
}
