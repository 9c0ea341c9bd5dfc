//! Media transport abstraction
//!
//! A [`MediaLink`] is one peer-to-peer media transport under negotiation:
//! it produces and consumes session descriptions, accepts remote
//! connectivity candidates, and reports transport health plus incoming
//! media tracks through an ordered event stream. [`WebRtcLinkFactory`]
//! provides the production implementation; tests script their own.

mod webrtc;

pub use self::webrtc::{WebRtcLink, WebRtcLinkFactory};

use crate::signaling::{CandidateInit, SdpMessage};
use crate::{CameraStreamRef, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
// leading `::` disambiguates the crate from the sibling module
use ::webrtc::track::track_remote::TrackRemote;

/// Transport health as reported by the underlying connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// Media is flowing
    Connected,
    /// Transport lost connectivity, possibly transient
    Disconnected,
    /// Transport failed
    Failed,
    /// Transport shut down
    Closed,
}

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
    /// Kind not reported
    Unknown,
}

/// Handle to a live remote media track, passed to the rendering layer
///
/// Carries the raw track for consumers that feed a decoder; scripted
/// test links produce detached handles with no underlying track.
#[derive(Clone)]
pub struct RemoteTrackHandle {
    track_id: String,
    kind: TrackKind,
    remote: Option<Arc<TrackRemote>>,
}

impl RemoteTrackHandle {
    /// Wrap a live remote track
    pub fn new(track_id: impl Into<String>, kind: TrackKind, remote: Arc<TrackRemote>) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
            remote: Some(remote),
        }
    }

    /// Build a handle with no underlying track (media consumed elsewhere)
    pub fn detached(track_id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
            remote: None,
        }
    }

    /// Track identifier
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// The underlying remote track, when attached
    pub fn remote(&self) -> Option<&Arc<TrackRemote>> {
        self.remote.as_ref()
    }
}

impl fmt::Debug for RemoteTrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrackHandle")
            .field("track_id", &self.track_id)
            .field("kind", &self.kind)
            .field("attached", &self.remote.is_some())
            .finish()
    }
}

/// Events produced by a media link, in occurrence order
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A locally gathered connectivity candidate to forward to the remote
    LocalCandidate(CandidateInit),
    /// A remote media track arrived
    TrackReceived(RemoteTrackHandle),
    /// Transport health changed
    Health(LinkHealth),
}

/// One peer-to-peer media transport under negotiation
#[async_trait]
pub trait MediaLink: Send {
    /// Create the local offer and install it as the local description
    async fn create_offer(&mut self) -> Result<SdpMessage>;

    /// Install a remote offer and produce the local answer
    async fn create_answer(&mut self, offer: SdpMessage) -> Result<SdpMessage>;

    /// Install the remote answer to a previously created local offer
    async fn apply_remote_answer(&mut self, answer: SdpMessage) -> Result<()>;

    /// Add a remote connectivity candidate
    async fn add_remote_candidate(&mut self, candidate: CandidateInit) -> Result<()>;

    /// Take the event stream; yields `None` if already taken
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>>;

    /// Release the transport (idempotent)
    async fn close(&mut self);
}

/// Creates one fresh [`MediaLink`] per negotiation attempt
#[async_trait]
pub trait MediaLinkFactory: Send + Sync {
    /// Open a link for the given stream
    async fn open_link(&self, stream: &CameraStreamRef) -> Result<Box<dyn MediaLink>>;
}
