//! Per-camera live video session management
//!
//! This crate supervises real-time camera streams negotiated with a remote
//! media gateway: it performs the signaling handshake, observes transport
//! health, classifies failures, reconnects with backoff, and raises
//! throttled alerts when a camera stays unreachable, without leaking
//! transports or spamming notification channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  CameraFleet (one supervisor per configured camera)      │
//! │  ├─ SessionSupervisor (retry loop, backoff, alerting)    │
//! │  │   ├─ MediaSession (state machine, one negotiation)    │
//! │  │   │   ├─ SignalingChannel (HTTP exchange │ WebSocket) │
//! │  │   │   └─ MediaLink (WebRTC peer connection)           │
//! │  │   ├─ BackoffPolicy (exponential │ fixed)              │
//! │  │   └─ NotificationThrottle → AlertDispatcher           │
//! │  └─ merged SessionEvent stream → dashboard               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Control flows downward (fleet → supervisor → session → transports);
//! events flow upward in occurrence order. Each camera runs as its own
//! tokio task with independent backoff timers, so a dashboard of sixteen
//! cameras reconnects sixteen streams without head-of-line blocking, and
//! closing any session immediately unblocks its in-flight waits.
//!
//! # Example
//!
//! ```no_run
//! use camlink::{AlertDispatcher, CameraFleet, CameraStreamRef, SupervisorConfig};
//!
//! # async fn example() {
//! let config = SupervisorConfig::default();
//! let (mut fleet, mut events) = CameraFleet::new(config, AlertDispatcher::new());
//!
//! fleet
//!     .configure_sessions(vec![
//!         CameraStreamRef::new("front-door", "http://192.168.1.10:8083"),
//!         CameraStreamRef::new("garage", "http://192.168.1.10:8083"),
//!     ])
//!     .await;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}: {} (attempt {})", event.stream_id, event.state, event.attempt);
//! }
//! # }
//! ```

#![warn(clippy::all)]

pub mod alert;
pub mod backoff;
pub mod config;
pub mod error;
pub mod gateway;
pub mod link;
pub mod session;
pub mod signaling;
pub mod supervisor;

pub use alert::{
    AlertChannel, AlertDispatcher, AlertNotifier, CameraAlert, EmailNotifier, NotificationThrottle,
    TelegramNotifier, WhatsAppNotifier,
};
pub use backoff::{BackoffPolicy, ExponentialBackoff, FixedBackoff};
pub use config::{
    BackoffConfig, CameraStreamRef, GatewayCredentials, SessionConfig, SignalingMode, StreamId,
    SupervisorConfig,
};
pub use error::{Error, Result};
pub use gateway::{GatewayClient, StreamDetails};
pub use link::{
    LinkEvent, LinkHealth, MediaLink, MediaLinkFactory, RemoteTrackHandle, TrackKind, WebRtcLink,
    WebRtcLinkFactory,
};
pub use session::{FailureKind, MediaSession, SessionEvent, SessionOutcome, SessionState};
pub use signaling::{
    CandidateInit, DuplexConnector, ExchangeConnector, NegotiationRole, OutboundSignal, SdpKind,
    SdpMessage, SignalEvent, SignalingChannel, SignalingConnector,
};
pub use supervisor::{CameraFleet, RetryContext, SessionSupervisor, SupervisorHandle};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
