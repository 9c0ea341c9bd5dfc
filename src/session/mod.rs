//! Media session: one camera stream's negotiation and health observation

mod state;

pub use state::{FailureKind, SessionEvent, SessionOutcome, SessionState};

use crate::config::{CameraStreamRef, SessionConfig};
use crate::link::{LinkEvent, LinkHealth, MediaLink, MediaLinkFactory, RemoteTrackHandle};
use crate::signaling::{
    NegotiationRole, OutboundSignal, SdpKind, SignalEvent, SignalingChannel, SignalingConnector,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Drives exactly one camera stream's negotiation and observes the
/// resulting transport's health
///
/// The session is the sole writer of its [`SessionState`]; every transition
/// is emitted, in order, on the event channel handed to [`MediaSession::new`].
/// At most one live negotiation exists per stream: each [`run`](Self::run)
/// opens fresh transports and releases them on every exit path, including
/// mid-negotiation failures and cancellation.
pub struct MediaSession {
    stream: CameraStreamRef,
    config: SessionConfig,
    connector: Arc<dyn SignalingConnector>,
    links: Arc<dyn MediaLinkFactory>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    shutdown: watch::Receiver<bool>,
    state: SessionState,
    attempt: u32,
    connected_in_attempt: bool,
}

impl MediaSession {
    /// Create a session for one stream
    ///
    /// State transitions flow to `events_tx`; the returned watch receiver
    /// carries the latest state for display. Flipping `shutdown` to `true`
    /// cancels any in-flight negotiation or wait immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: CameraStreamRef,
        config: SessionConfig,
        connector: Arc<dyn SignalingConnector>,
        links: Arc<dyn MediaLinkFactory>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        (
            Self {
                stream,
                config,
                connector,
                links,
                events_tx,
                state_tx,
                shutdown,
                state: SessionState::Idle,
                attempt: 0,
                connected_in_attempt: false,
            },
            state_rx,
        )
    }

    /// The stream this session serves
    pub fn stream(&self) -> &CameraStreamRef {
        &self.stream
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record the supervisor's attempt counter for emitted events
    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Whether the last [`run`](Self::run) reached `Connected` at least once
    pub fn connected_last_attempt(&self) -> bool {
        self.connected_in_attempt
    }

    /// Drive one negotiation attempt to its classified end
    ///
    /// Any prior attempt's transports are gone by construction: they are
    /// owned by the attempt and released before it returns. The outcome is
    /// delivered exactly once per attempt; afterwards the session is in
    /// `Failed` (retryable outcomes) or unchanged (`Cancelled`, the caller
    /// closes next).
    pub async fn run(&mut self) -> SessionOutcome {
        self.connected_in_attempt = false;

        if *self.shutdown.borrow() {
            return SessionOutcome::Cancelled;
        }

        self.set_state(SessionState::Negotiating, None, None);

        let outcome = match self.negotiate().await {
            Ok(outcome) => outcome,
            Err(err) => self.classify(err),
        };

        if !matches!(outcome, SessionOutcome::Cancelled) {
            if self.state == SessionState::Connected {
                self.set_state(SessionState::Degraded, None, None);
            }
            self.set_state(SessionState::Failed, None, outcome.kind());
        }

        outcome
    }

    /// Tear the session down (idempotent)
    ///
    /// Transports are owned and released by [`run`](Self::run) on every exit
    /// path; closing here finalizes the lifecycle state.
    pub async fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.set_state(SessionState::Closed, None, None);
        }
    }

    /// Open fresh transports, drive the exchange, release on every path
    async fn negotiate(&mut self) -> Result<SessionOutcome> {
        let mut shutdown = self.shutdown.clone();

        let mut link = self.links.open_link(&self.stream).await?;

        let mut link_events = match link.take_events() {
            Some(events) => events,
            None => {
                link.close().await;
                return Err(Error::Negotiation(
                    "media link event stream unavailable".to_string(),
                ));
            }
        };

        let mut channel = match self.connector.open(&self.stream).await {
            Ok(channel) => channel,
            Err(err) => {
                link.close().await;
                return Err(err);
            }
        };

        let result = self
            .drive(&mut shutdown, link.as_mut(), &mut link_events, channel.as_mut())
            .await;

        channel.close().await;
        link.close().await;

        result
    }

    async fn drive(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        link: &mut dyn MediaLink,
        link_events: &mut mpsc::UnboundedReceiver<LinkEvent>,
        channel: &mut dyn SignalingChannel,
    ) -> Result<SessionOutcome> {
        if channel.role() == NegotiationRole::LocalOffer {
            let offer = tokio::select! {
                offer = link.create_offer() => offer?,
                _ = wait_shutdown(shutdown) => return Ok(SessionOutcome::Cancelled),
            };
            tokio::select! {
                sent = channel.send(OutboundSignal::Description(offer)) => sent?,
                _ = wait_shutdown(shutdown) => return Ok(SessionOutcome::Cancelled),
            }
        }

        let mut negotiated = false;
        let mut track: Option<RemoteTrackHandle> = None;

        let deadline = tokio::time::sleep(self.config.negotiation_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = wait_shutdown(shutdown) => {
                    return Ok(SessionOutcome::Cancelled);
                }
                () = &mut deadline, if self.state == SessionState::Negotiating => {
                    return Err(Error::Timeout(format!(
                        "negotiation did not complete within {:?}",
                        self.config.negotiation_timeout()
                    )));
                }
                event = channel.next_event() => match event {
                    Some(SignalEvent::RemoteDescription(desc)) => {
                        match (channel.role(), desc.kind) {
                            (NegotiationRole::LocalOffer, SdpKind::Answer) => {
                                link.apply_remote_answer(desc).await?;
                                negotiated = true;
                            }
                            (NegotiationRole::RemoteOffer, SdpKind::Offer) => {
                                let answer = link.create_answer(desc).await?;
                                channel.send(OutboundSignal::Description(answer)).await?;
                                negotiated = true;
                            }
                            (role, kind) => {
                                warn!(?role, ?kind, "unexpected remote description, ignoring");
                            }
                        }
                        self.maybe_connected(negotiated, &track);
                    }
                    Some(SignalEvent::RemoteCandidate(candidate)) => {
                        if let Err(e) = link.add_remote_candidate(candidate).await {
                            warn!(
                                stream = %self.stream.stream_id,
                                "rejected remote candidate: {}", e
                            );
                        }
                    }
                    Some(SignalEvent::ErrorNotice(message)) => {
                        return Ok(SessionOutcome::Protocol(message));
                    }
                    Some(SignalEvent::Closed { initiated: true }) => {
                        return Ok(SessionOutcome::Cancelled);
                    }
                    Some(SignalEvent::Closed { initiated: false }) | None => {
                        return Ok(SessionOutcome::Connectivity(Error::WebSocket(
                            "signaling channel closed".to_string(),
                        )));
                    }
                },
                event = link_events.recv() => match event {
                    Some(LinkEvent::LocalCandidate(candidate)) => {
                        if let Err(e) = channel.send(OutboundSignal::Candidate(candidate)).await {
                            warn!(
                                stream = %self.stream.stream_id,
                                "failed to forward local candidate: {}", e
                            );
                        }
                    }
                    Some(LinkEvent::TrackReceived(handle)) => {
                        if track.is_none() {
                            debug!(
                                stream = %self.stream.stream_id,
                                track_id = %handle.track_id(),
                                "first remote track"
                            );
                            track = Some(handle);
                        }
                        self.maybe_connected(negotiated, &track);
                    }
                    Some(LinkEvent::Health(health)) => {
                        if let Some(outcome) = self.on_health(health)? {
                            return Ok(outcome);
                        }
                    }
                    None => {
                        return Err(Error::Negotiation(
                            "media link event stream ended".to_string(),
                        ));
                    }
                },
            }
        }
    }

    /// Negotiation completed and the first remote track arrived
    fn maybe_connected(&mut self, negotiated: bool, track: &Option<RemoteTrackHandle>) {
        if negotiated && track.is_some() && self.state == SessionState::Negotiating {
            self.connected_in_attempt = true;
            self.set_state(SessionState::Connected, track.clone(), None);
        }
    }

    /// Map a transport health change onto the state machine
    ///
    /// Returns a terminal outcome for fatal health, `Err` for pre-connect
    /// transport failure (classified by the caller), `None` otherwise.
    fn on_health(&mut self, health: LinkHealth) -> Result<Option<SessionOutcome>> {
        match health {
            LinkHealth::Connected => {
                // transport recovered on its own
                if self.state == SessionState::Degraded {
                    self.set_state(SessionState::Connected, None, None);
                }
                Ok(None)
            }
            LinkHealth::Disconnected => {
                if self.state == SessionState::Connected {
                    self.set_state(SessionState::Degraded, None, None);
                }
                Ok(None)
            }
            LinkHealth::Failed | LinkHealth::Closed => {
                let err = Error::Ice(format!("transport reported {:?}", health));
                if self.connected_in_attempt {
                    Ok(Some(SessionOutcome::Connectivity(err)))
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Convert a negotiation error into the classified outcome
    fn classify(&self, err: Error) -> SessionOutcome {
        match err {
            Error::Cancelled => SessionOutcome::Cancelled,
            Error::Protocol(message) => SessionOutcome::Protocol(message),
            err if self.connected_in_attempt => SessionOutcome::Connectivity(err),
            err => SessionOutcome::Setup(err),
        }
    }

    fn set_state(
        &mut self,
        next: SessionState,
        track: Option<RemoteTrackHandle>,
        failure: Option<FailureKind>,
    ) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!(
                stream = %self.stream.stream_id,
                from = %self.state,
                to = %next,
                "suppressing illegal state transition"
            );
            return;
        }

        debug!(
            stream = %self.stream.stream_id,
            from = %self.state,
            to = %next,
            "session state transition"
        );

        self.state = next;
        let _ = self.state_tx.send(next);
        let _ = self.events_tx.send(SessionEvent {
            stream_id: self.stream.stream_id.clone(),
            state: next,
            attempt: self.attempt,
            track,
            failure,
        });
    }
}

/// Resolve once the shutdown flag flips to true (or the sender is gone)
async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
