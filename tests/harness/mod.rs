//! Shared scripted fakes for session and supervisor tests
//!
//! The fakes replace the two transport seams (signaling channel and media
//! link) with scripted behavior and count every open/close so tests can
//! assert that no transport survives a teardown.

#![allow(dead_code)]

use async_trait::async_trait;
use camlink::{
    AlertChannel, AlertNotifier, CameraAlert, CameraStreamRef, CandidateInit, Error, LinkEvent,
    LinkHealth, MediaLink, MediaLinkFactory, NegotiationRole, OutboundSignal, RemoteTrackHandle,
    Result, SdpMessage, SessionEvent, SignalEvent, SignalingChannel, SignalingConnector, TrackKind,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Counts transport opens and closes across a test
#[derive(Debug, Default)]
pub struct CloseLedger {
    pub links_opened: AtomicUsize,
    pub links_closed: AtomicUsize,
    pub channels_opened: AtomicUsize,
    pub channels_closed: AtomicUsize,
}

impl CloseLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every opened transport has been closed
    pub fn balanced(&self) -> bool {
        self.links_opened.load(Ordering::SeqCst) == self.links_closed.load(Ordering::SeqCst)
            && self.channels_opened.load(Ordering::SeqCst)
                == self.channels_closed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Scripted media links
// ---------------------------------------------------------------------------

/// One step of a scripted link's event playback
#[derive(Debug, Clone)]
pub enum LinkStep {
    /// Wait before the next step
    Delay(Duration),
    /// Deliver a remote track
    Track(&'static str),
    /// Report transport health
    Health(LinkHealth),
}

/// A link that connects (track + healthy transport) and stays up
pub fn link_connects() -> Vec<LinkStep> {
    vec![
        LinkStep::Delay(Duration::from_millis(10)),
        LinkStep::Health(LinkHealth::Connected),
        LinkStep::Track("video-0"),
    ]
}

/// A link whose transport fails before ever connecting
pub fn link_fails_setup() -> Vec<LinkStep> {
    vec![
        LinkStep::Delay(Duration::from_millis(10)),
        LinkStep::Health(LinkHealth::Failed),
    ]
}

/// A link that connects, degrades, then fails
pub fn link_connects_then_fails() -> Vec<LinkStep> {
    vec![
        LinkStep::Delay(Duration::from_millis(10)),
        LinkStep::Health(LinkHealth::Connected),
        LinkStep::Track("video-0"),
        LinkStep::Delay(Duration::from_millis(50)),
        LinkStep::Health(LinkHealth::Disconnected),
        LinkStep::Delay(Duration::from_millis(20)),
        LinkStep::Health(LinkHealth::Failed),
    ]
}

/// A link that connects, degrades, then recovers on its own
pub fn link_degrades_then_recovers() -> Vec<LinkStep> {
    vec![
        LinkStep::Delay(Duration::from_millis(10)),
        LinkStep::Health(LinkHealth::Connected),
        LinkStep::Track("video-0"),
        LinkStep::Delay(Duration::from_millis(50)),
        LinkStep::Health(LinkHealth::Disconnected),
        LinkStep::Delay(Duration::from_millis(50)),
        LinkStep::Health(LinkHealth::Connected),
    ]
}

/// A link that produces nothing (negotiation never completes)
pub fn link_silent() -> Vec<LinkStep> {
    Vec::new()
}

pub struct FakeLink {
    events_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    ledger: Arc<CloseLedger>,
    closed: bool,
}

impl FakeLink {
    fn new(script: Vec<LinkStep>, ledger: Arc<CloseLedger>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for step in script {
                match step {
                    LinkStep::Delay(delay) => tokio::time::sleep(delay).await,
                    LinkStep::Track(id) => {
                        if tx
                            .send(LinkEvent::TrackReceived(RemoteTrackHandle::detached(
                                id,
                                TrackKind::Video,
                            )))
                            .is_err()
                        {
                            return;
                        }
                    }
                    LinkStep::Health(health) => {
                        if tx.send(LinkEvent::Health(health)).is_err() {
                            return;
                        }
                    }
                }
            }
            // keep the sender alive so the event stream stays open
            std::future::pending::<()>().await;
        });

        Self {
            events_rx: Some(rx),
            ledger,
            closed: false,
        }
    }
}

#[async_trait]
impl MediaLink for FakeLink {
    async fn create_offer(&mut self) -> Result<SdpMessage> {
        Ok(SdpMessage::offer("v=0\r\nfake-offer"))
    }

    async fn create_answer(&mut self, _offer: SdpMessage) -> Result<SdpMessage> {
        Ok(SdpMessage::answer("v=0\r\nfake-answer"))
    }

    async fn apply_remote_answer(&mut self, _answer: SdpMessage) -> Result<()> {
        Ok(())
    }

    async fn add_remote_candidate(&mut self, _candidate: CandidateInit) -> Result<()> {
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.events_rx.take()
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ledger.links_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Hands out scripted links in order; repeats the last script when the
/// queue runs dry
pub struct FakeLinkFactory {
    scripts: Mutex<VecDeque<Vec<LinkStep>>>,
    fallback: Vec<LinkStep>,
    pub ledger: Arc<CloseLedger>,
}

impl FakeLinkFactory {
    pub fn new(scripts: Vec<Vec<LinkStep>>, ledger: Arc<CloseLedger>) -> Arc<Self> {
        let fallback = scripts.last().cloned().unwrap_or_default();
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            fallback,
            ledger,
        })
    }

    pub fn always(script: Vec<LinkStep>, ledger: Arc<CloseLedger>) -> Arc<Self> {
        Self::new(vec![script], ledger)
    }
}

#[async_trait]
impl MediaLinkFactory for FakeLinkFactory {
    async fn open_link(&self, _stream: &CameraStreamRef) -> Result<Box<dyn MediaLink>> {
        let script = self
            .scripts
            .lock()
            .expect("script queue poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.ledger.links_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeLink::new(script, self.ledger.clone())))
    }
}

// ---------------------------------------------------------------------------
// Scripted signaling channels
// ---------------------------------------------------------------------------

/// How a scripted channel behaves for one negotiation attempt
#[derive(Debug, Clone)]
pub enum ChannelBehavior {
    /// Exchange-style: sending the local description yields the remote answer
    Exchange,
    /// Exchange-style: the negotiation request fails at the HTTP level
    ExchangeTransportError,
    /// Exchange-style: the gateway reports an application error
    ExchangeProtocolError(&'static str),
    /// Exchange-style: the response payload is malformed
    ExchangeDecodeError,
    /// Duplex-style: play the scripted inbound events
    Duplex(Vec<ChannelStep>),
    /// The connector itself refuses to open
    OpenFails,
}

/// One step of a duplex channel's inbound playback
#[derive(Debug, Clone)]
pub enum ChannelStep {
    Delay(Duration),
    Offer,
    Candidate(&'static str),
    ErrorNotice(&'static str),
    /// Unintentional transport-level closure
    ClosedRemote,
}

pub struct FakeChannel {
    role: NegotiationRole,
    behavior: ChannelBehavior,
    events_tx: mpsc::UnboundedSender<SignalEvent>,
    events_rx: mpsc::UnboundedReceiver<SignalEvent>,
    sent: Arc<Mutex<Vec<OutboundSignal>>>,
    ledger: Arc<CloseLedger>,
    closed: bool,
}

impl FakeChannel {
    fn new(
        behavior: ChannelBehavior,
        sent: Arc<Mutex<Vec<OutboundSignal>>>,
        ledger: Arc<CloseLedger>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let role = match &behavior {
            ChannelBehavior::Duplex(steps) => {
                let tx = events_tx.clone();
                let steps = steps.clone();
                tokio::spawn(async move {
                    for step in steps {
                        let event = match step {
                            ChannelStep::Delay(delay) => {
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                            ChannelStep::Offer => {
                                SignalEvent::RemoteDescription(SdpMessage::offer("v=0\r\nremote"))
                            }
                            ChannelStep::Candidate(candidate) => {
                                SignalEvent::RemoteCandidate(CandidateInit {
                                    candidate: candidate.to_string(),
                                    sdp_mid: Some("0".to_string()),
                                    sdp_m_line_index: Some(0),
                                })
                            }
                            ChannelStep::ErrorNotice(message) => {
                                SignalEvent::ErrorNotice(message.to_string())
                            }
                            ChannelStep::ClosedRemote => SignalEvent::Closed { initiated: false },
                        };
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    std::future::pending::<()>().await;
                });
                NegotiationRole::RemoteOffer
            }
            _ => NegotiationRole::LocalOffer,
        };

        Self {
            role,
            behavior,
            events_tx,
            events_rx,
            sent,
            ledger,
            closed: false,
        }
    }
}

#[async_trait]
impl SignalingChannel for FakeChannel {
    fn role(&self) -> NegotiationRole {
        self.role
    }

    async fn send(&mut self, signal: OutboundSignal) -> Result<()> {
        let is_description = matches!(signal, OutboundSignal::Description(_));
        self.sent.lock().expect("sent log poisoned").push(signal);

        if !is_description {
            return Ok(());
        }

        match &self.behavior {
            ChannelBehavior::Exchange => {
                let _ = self.events_tx.send(SignalEvent::RemoteDescription(
                    SdpMessage::answer("v=0\r\ngateway-answer"),
                ));
                Ok(())
            }
            ChannelBehavior::ExchangeTransportError => {
                Err(Error::Transport("gateway returned 502".to_string()))
            }
            ChannelBehavior::ExchangeProtocolError(message) => {
                Err(Error::Protocol(message.to_string()))
            }
            ChannelBehavior::ExchangeDecodeError => {
                Err(Error::Decode("malformed negotiation response".to_string()))
            }
            ChannelBehavior::Duplex(_) | ChannelBehavior::OpenFails => Ok(()),
        }
    }

    async fn next_event(&mut self) -> Option<SignalEvent> {
        self.events_rx.recv().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ledger.channels_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Hands out scripted channels in order; repeats the last behavior when
/// the queue runs dry
pub struct FakeConnector {
    behaviors: Mutex<VecDeque<ChannelBehavior>>,
    fallback: ChannelBehavior,
    pub sent: Arc<Mutex<Vec<OutboundSignal>>>,
    pub ledger: Arc<CloseLedger>,
}

impl FakeConnector {
    pub fn new(behaviors: Vec<ChannelBehavior>, ledger: Arc<CloseLedger>) -> Arc<Self> {
        let fallback = behaviors.last().cloned().unwrap_or(ChannelBehavior::Exchange);
        Arc::new(Self {
            behaviors: Mutex::new(behaviors.into()),
            fallback,
            sent: Arc::new(Mutex::new(Vec::new())),
            ledger,
        })
    }

    pub fn always(behavior: ChannelBehavior, ledger: Arc<CloseLedger>) -> Arc<Self> {
        Self::new(vec![behavior], ledger)
    }

    /// Outbound descriptions recorded across all attempts
    pub fn sent_descriptions(&self) -> Vec<SdpMessage> {
        self.sent
            .lock()
            .expect("sent log poisoned")
            .iter()
            .filter_map(|signal| match signal {
                OutboundSignal::Description(sdp) => Some(sdp.clone()),
                OutboundSignal::Candidate(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl SignalingConnector for FakeConnector {
    async fn open(&self, _stream: &CameraStreamRef) -> Result<Box<dyn SignalingChannel>> {
        let behavior = self
            .behaviors
            .lock()
            .expect("behavior queue poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if matches!(behavior, ChannelBehavior::OpenFails) {
            return Err(Error::Transport("connection refused".to_string()));
        }

        self.ledger.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeChannel::new(
            behavior,
            self.sent.clone(),
            self.ledger.clone(),
        )))
    }
}

// ---------------------------------------------------------------------------
// Alert probes
// ---------------------------------------------------------------------------

/// Records every alert it is asked to deliver
pub struct CountingNotifier {
    channel: AlertChannel,
    pub calls: AtomicU32,
    pub last_alert: Mutex<Option<CameraAlert>>,
}

impl CountingNotifier {
    pub fn new(channel: AlertChannel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            calls: AtomicU32::new(0),
            last_alert: Mutex::new(None),
        })
    }

    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertNotifier for CountingNotifier {
    fn channel(&self) -> AlertChannel {
        self.channel
    }

    async fn notify(&self, alert: &CameraAlert) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_alert.lock().expect("alert slot poisoned") = Some(alert.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

/// Await the next session event, failing the test on a stuck stream
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Drain whatever events are immediately available
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Standard stream reference for tests
pub fn test_stream(id: &str) -> CameraStreamRef {
    CameraStreamRef::new(id, "http://gateway.test:8083")
}
