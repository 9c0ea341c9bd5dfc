//! Dashboard-facing supervisor set with reconciliation

use super::{SessionSupervisor, SupervisorHandle};
use crate::alert::AlertDispatcher;
use crate::config::{CameraStreamRef, StreamId, SupervisorConfig};
use crate::link::{MediaLinkFactory, WebRtcLinkFactory};
use crate::session::{SessionEvent, SessionState};
use crate::signaling::{self, SignalingConnector};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Owns one supervisor per configured camera and reconciles the set
/// against the desired configuration
///
/// Sessions never share transports; a changed stream reference is applied
/// as close-old-then-start-new, never as a live mutation.
pub struct CameraFleet {
    config: SupervisorConfig,
    connector: Arc<dyn SignalingConnector>,
    links: Arc<dyn MediaLinkFactory>,
    dispatcher: Arc<AlertDispatcher>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    supervisors: HashMap<StreamId, SupervisorHandle>,
}

impl CameraFleet {
    /// Create a fleet with production transports
    ///
    /// Returns the fleet and the merged event stream of all its sessions.
    pub fn new(
        config: SupervisorConfig,
        dispatcher: AlertDispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let connector = signaling::connector_for(&config.session);
        let links = Arc::new(WebRtcLinkFactory::new(config.session.stun_servers.clone()));
        Self::with_transports(config, dispatcher, connector, links)
    }

    /// Create a fleet with explicit transport factories
    pub fn with_transports(
        config: SupervisorConfig,
        dispatcher: AlertDispatcher,
        connector: Arc<dyn SignalingConnector>,
        links: Arc<dyn MediaLinkFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                config,
                connector,
                links,
                dispatcher: Arc::new(dispatcher),
                events_tx,
                supervisors: HashMap::new(),
            },
            events_rx,
        )
    }

    /// Reconcile the running set against `refs`
    ///
    /// Removed streams are closed, added streams are started, unchanged
    /// streams are left running. A stream whose reference changed is closed
    /// and restarted with the new reference.
    pub async fn configure_sessions(&mut self, refs: Vec<CameraStreamRef>) {
        let desired: HashMap<StreamId, CameraStreamRef> = refs
            .into_iter()
            .map(|stream| (stream.stream_id.clone(), stream))
            .collect();

        let running: Vec<StreamId> = self.supervisors.keys().cloned().collect();
        for stream_id in running {
            let keep = match desired.get(&stream_id) {
                Some(stream) => self.supervisors[&stream_id].stream() == stream,
                None => false,
            };

            if !keep {
                if let Some(handle) = self.supervisors.remove(&stream_id) {
                    info!(stream = %stream_id, "closing removed session");
                    handle.close().await;
                }
            }
        }

        for (stream_id, stream) in desired {
            if self.supervisors.contains_key(&stream_id) {
                debug!(stream = %stream_id, "session unchanged");
                continue;
            }

            info!(stream = %stream_id, "starting session");
            let handle = SessionSupervisor::spawn(
                stream,
                &self.config,
                self.connector.clone(),
                self.links.clone(),
                self.dispatcher.clone(),
                self.events_tx.clone(),
            );
            self.supervisors.insert(stream_id, handle);
        }
    }

    /// Close every session and wait for the tasks to finish
    pub async fn close_all(&mut self) {
        for (stream_id, handle) in self.supervisors.drain() {
            info!(stream = %stream_id, "closing session");
            handle.close().await;
        }
    }

    /// Snapshot of (stream, state, attempt) for display
    pub fn states(&self) -> Vec<(StreamId, SessionState, u32)> {
        self.supervisors
            .iter()
            .map(|(stream_id, handle)| (stream_id.clone(), handle.state(), handle.attempt()))
            .collect()
    }

    /// Number of supervised sessions
    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    /// True when no sessions are supervised
    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }
}
