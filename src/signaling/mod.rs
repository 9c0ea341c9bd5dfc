//! Signaling transports for stream negotiation
//!
//! Two variants negotiate with the gateway:
//! - [`ExchangeConnector`]: a one-shot HTTP exchange; POST the local offer,
//!   receive the remote answer in the response body.
//! - [`DuplexConnector`]: a persistent WebSocket carrying descriptions and
//!   connectivity candidates in both directions.
//!
//! Both expose the same [`SignalingChannel`] shape so the session logic is
//! agnostic to which one is configured. A fresh channel is opened per
//! negotiation attempt through the [`SignalingConnector`] seam.

mod exchange;
mod duplex;

pub use duplex::DuplexConnector;
pub use exchange::ExchangeConnector;

use crate::config::{SessionConfig, SignalingMode};
use crate::{CameraStreamRef, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A session description on the wire: `{"type": ..., "sdp": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpMessage {
    /// Description kind
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// Raw SDP payload
    pub sdp: String,
}

impl SdpMessage {
    /// Build an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Build an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Offer/answer discriminator, serialized lowercase to match the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Session offer
    Offer,
    /// Session answer
    Answer,
}

/// A connectivity candidate on the wire (browser-compatible field names)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInit {
    /// Candidate line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description the candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Inbound signaling events, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// The remote side's session description
    RemoteDescription(SdpMessage),
    /// A remote connectivity candidate
    RemoteCandidate(CandidateInit),
    /// The remote side reported an application-level error
    ErrorNotice(String),
    /// Terminal: the channel closed; `initiated` is true for caller-initiated
    /// closure, false for transport-level closure
    Closed {
        /// Whether closure was requested locally
        initiated: bool,
    },
}

/// Outbound signaling messages
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSignal {
    /// The local session description
    Description(SdpMessage),
    /// A local connectivity candidate
    Candidate(CandidateInit),
}

/// Which side produces the initial session description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// The local side offers; the gateway answers (exchange variant)
    LocalOffer,
    /// The gateway offers; the local side answers (duplex variant)
    RemoteOffer,
}

/// One negotiation transport attached to one camera stream
///
/// `close` is idempotent and aborts any in-flight work without leaking the
/// underlying transport. After closure `next_event` drains any already
/// received events, delivers the terminal [`SignalEvent::Closed`], then
/// yields `None`.
#[async_trait]
pub trait SignalingChannel: Send {
    /// Which side produces the initial description on this channel
    fn role(&self) -> NegotiationRole;

    /// Send a local description or candidate
    async fn send(&mut self, signal: OutboundSignal) -> Result<()>;

    /// Await the next inbound event; `None` once the channel is spent
    async fn next_event(&mut self) -> Option<SignalEvent>;

    /// Close the channel and release the transport (idempotent)
    async fn close(&mut self);
}

/// Opens a fresh signaling channel per negotiation attempt
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Open a channel for the given stream
    async fn open(&self, stream: &CameraStreamRef) -> Result<Box<dyn SignalingChannel>>;
}

/// Build the connector matching the configured signaling variant
pub fn connector_for(config: &SessionConfig) -> Arc<dyn SignalingConnector> {
    match config.signaling {
        SignalingMode::Exchange => Arc::new(ExchangeConnector::new()),
        SignalingMode::Duplex => Arc::new(DuplexConnector::new()),
    }
}

/// Message framing on the persistent duplex socket:
/// `{"type": "offer"|"answer"|"candidate"|"error", "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Remote or local offer
    Offer(SdpMessage),
    /// Remote or local answer
    Answer(SdpMessage),
    /// Connectivity candidate
    Candidate(CandidateInit),
    /// Application-level error report
    Error(String),
}

impl SignalMessage {
    /// Map an inbound frame to a channel event
    pub fn into_event(self) -> SignalEvent {
        match self {
            SignalMessage::Offer(sdp) | SignalMessage::Answer(sdp) => {
                SignalEvent::RemoteDescription(sdp)
            }
            SignalMessage::Candidate(candidate) => SignalEvent::RemoteCandidate(candidate),
            SignalMessage::Error(message) => SignalEvent::ErrorNotice(message),
        }
    }

    /// Frame an outbound signal
    pub fn from_outbound(signal: OutboundSignal) -> Self {
        match signal {
            OutboundSignal::Description(sdp) => match sdp.kind {
                SdpKind::Offer => SignalMessage::Offer(sdp),
                SdpKind::Answer => SignalMessage::Answer(sdp),
            },
            OutboundSignal::Candidate(candidate) => SignalMessage::Candidate(candidate),
        }
    }
}
