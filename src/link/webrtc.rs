//! Media link over webrtc-rs peer connections

use super::{LinkEvent, LinkHealth, MediaLink, MediaLinkFactory, RemoteTrackHandle, TrackKind};
use crate::signaling::{CandidateInit, SdpMessage};
use crate::{CameraStreamRef, Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Opens receive-only WebRTC peer connections, one per negotiation attempt
pub struct WebRtcLinkFactory {
    stun_servers: Vec<String>,
}

impl WebRtcLinkFactory {
    /// Create a factory using the given STUN servers
    pub fn new(stun_servers: Vec<String>) -> Self {
        Self { stun_servers }
    }
}

#[async_trait]
impl MediaLinkFactory for WebRtcLinkFactory {
    async fn open_link(&self, stream: &CameraStreamRef) -> Result<Box<dyn MediaLink>> {
        let link = WebRtcLink::connect(stream, &self.stun_servers).await?;
        Ok(Box::new(link))
    }
}

/// WebRTC peer connection receiving one camera's media
pub struct WebRtcLink {
    connection_id: String,
    peer: Arc<RTCPeerConnection>,
    events_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    closed: bool,
}

impl WebRtcLink {
    /// Create the peer connection, register recvonly transceivers, and wire
    /// transport callbacks into the event stream
    pub async fn connect(stream: &CameraStreamRef, stun_servers: &[String]) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();

        debug!(
            stream = %stream.stream_id,
            connection_id = %connection_id,
            "creating peer connection"
        );

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Negotiation(format!("failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::Negotiation(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::Negotiation(format!("failed to create peer connection: {}", e)))?,
        );

        // camera streams are receive-only on this side
        for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
            peer.add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| Error::Negotiation(format!("failed to add {} transceiver: {}", kind, e)))?;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let track_tx = events_tx.clone();
        peer.on_track(Box::new(move |track, _receiver, _transceiver| {
            let track_tx = track_tx.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    _ => TrackKind::Unknown,
                };
                info!(track_id = %track.id(), ?kind, "remote track received");
                let handle = RemoteTrackHandle::new(track.id(), kind, track);
                let _ = track_tx.send(LinkEvent::TrackReceived(handle));
            })
        }));

        let health_tx = events_tx.clone();
        peer.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            let health_tx = health_tx.clone();
            Box::pin(async move {
                let health = match state {
                    RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                        Some(LinkHealth::Connected)
                    }
                    RTCIceConnectionState::Disconnected => Some(LinkHealth::Disconnected),
                    RTCIceConnectionState::Failed => Some(LinkHealth::Failed),
                    RTCIceConnectionState::Closed => Some(LinkHealth::Closed),
                    _ => None,
                };

                if let Some(health) = health {
                    debug!(ice_state = %state, ?health, "transport health changed");
                    let _ = health_tx.send(LinkEvent::Health(health));
                }
            })
        }));

        let candidate_tx = events_tx;
        peer.on_ice_candidate(Box::new(move |candidate| {
            let candidate_tx = candidate_tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(json) => {
                        let _ = candidate_tx.send(LinkEvent::LocalCandidate(CandidateInit {
                            candidate: json.candidate,
                            sdp_mid: json.sdp_mid,
                            sdp_m_line_index: json.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        Ok(Self {
            connection_id,
            peer,
            events_rx: Some(events_rx),
            closed: false,
        })
    }

    /// Unique identifier of this connection instance
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn local_description(&self) -> Result<SdpMessage> {
        let desc = self
            .peer
            .local_description()
            .await
            .ok_or_else(|| Error::Negotiation("no local description after setting it".to_string()))?;

        Ok(SdpMessage {
            kind: match desc.sdp_type {
                webrtc::peer_connection::sdp::sdp_type::RTCSdpType::Offer => {
                    crate::signaling::SdpKind::Offer
                }
                _ => crate::signaling::SdpKind::Answer,
            },
            sdp: desc.sdp,
        })
    }
}

#[async_trait]
impl MediaLink for WebRtcLink {
    async fn create_offer(&mut self) -> Result<SdpMessage> {
        let offer = self
            .peer
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create offer: {}", e)))?;

        self.peer
            .set_local_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to set local description: {}", e)))?;

        debug!(connection_id = %self.connection_id, "created local offer");
        self.local_description().await
    }

    async fn create_answer(&mut self, offer: SdpMessage) -> Result<SdpMessage> {
        let remote = RTCSessionDescription::offer(offer.sdp)
            .map_err(|e| Error::Decode(format!("failed to parse remote offer: {}", e)))?;

        self.peer
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to set remote description: {}", e)))?;

        let answer = self
            .peer
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create answer: {}", e)))?;

        self.peer
            .set_local_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to set local description: {}", e)))?;

        debug!(connection_id = %self.connection_id, "created local answer");
        self.local_description().await
    }

    async fn apply_remote_answer(&mut self, answer: SdpMessage) -> Result<()> {
        let remote = RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| Error::Decode(format!("failed to parse remote answer: {}", e)))?;

        self.peer
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to set remote description: {}", e)))?;

        debug!(connection_id = %self.connection_id, "applied remote answer");
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: CandidateInit) -> Result<()> {
        self.peer
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .map_err(|e| Error::Ice(format!("failed to add remote candidate: {}", e)))
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.events_rx.take()
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        debug!(connection_id = %self.connection_id, "closing peer connection");
        if let Err(e) = self.peer.close().await {
            warn!(connection_id = %self.connection_id, "error closing peer connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::SdpKind;

    fn stream() -> CameraStreamRef {
        CameraStreamRef::new("cam-test", "http://gateway.local:8083")
    }

    fn stun() -> Vec<String> {
        vec!["stun:stun.l.google.com:19302".to_string()]
    }

    #[tokio::test]
    async fn test_link_creation() {
        let mut link = WebRtcLink::connect(&stream(), &stun()).await.unwrap();
        assert!(!link.connection_id().is_empty());
        assert!(link.take_events().is_some());
        assert!(link.take_events().is_none());
        link.close().await;
    }

    #[tokio::test]
    async fn test_create_offer_is_recvonly() {
        let mut link = WebRtcLink::connect(&stream(), &stun()).await.unwrap();
        let offer = link.create_offer().await.unwrap();

        assert_eq!(offer.kind, SdpKind::Offer);
        assert!(offer.sdp.contains("recvonly"));
        assert!(offer.sdp.contains("video"));

        link.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut link = WebRtcLink::connect(&stream(), &stun()).await.unwrap();
        link.close().await;
        link.close().await;
    }

    #[tokio::test]
    async fn test_factory_opens_link() {
        let factory = WebRtcLinkFactory::new(stun());
        let mut link = factory.open_link(&stream()).await.unwrap();
        let offer = link.create_offer().await.unwrap();
        assert!(!offer.sdp.is_empty());
        link.close().await;
    }
}
