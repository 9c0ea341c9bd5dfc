//! Per-camera session supervision: retries, backoff, throttled alerting

mod fleet;

pub use fleet::CameraFleet;

use crate::alert::{AlertDispatcher, CameraAlert, NotificationThrottle};
use crate::backoff::BackoffPolicy;
use crate::config::{CameraStreamRef, SupervisorConfig};
use crate::link::MediaLinkFactory;
use crate::session::{MediaSession, SessionEvent, SessionOutcome, SessionState};
use crate::signaling::SignalingConnector;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Retry bookkeeping for one camera
///
/// Reset to zero whenever the session reaches `Connected`: a camera that
/// recovers earns a fresh retry budget.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Consecutive failed attempts so far
    pub attempt: u32,
    /// Retry ceiling
    pub max_attempts: u32,
    /// Delay chosen for the upcoming retry
    pub next_delay: Duration,
}

impl RetryContext {
    /// Create a context with no failures recorded
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            next_delay: Duration::ZERO,
        }
    }

    /// Clear the failure streak
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = Duration::ZERO;
    }

    /// Whether the retry budget is spent
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Supervises one [`MediaSession`]: reconnects on retryable failures with
/// backoff, enforces the retry ceiling, and reports unrecoverable failure
/// through the notification throttle
pub struct SessionSupervisor {
    session: MediaSession,
    retry: RetryContext,
    backoff: Arc<dyn BackoffPolicy>,
    throttle: NotificationThrottle,
    dispatcher: Arc<AlertDispatcher>,
    shutdown: watch::Receiver<bool>,
    attempt_gauge: Arc<AtomicU32>,
}

impl SessionSupervisor {
    /// Spawn a supervision task for one camera stream
    ///
    /// Session events flow to `events`; the returned handle exposes state
    /// and attempt snapshots and tears the task down on
    /// [`close`](SupervisorHandle::close).
    pub fn spawn(
        stream: CameraStreamRef,
        config: &SupervisorConfig,
        connector: Arc<dyn SignalingConnector>,
        links: Arc<dyn MediaLinkFactory>,
        dispatcher: Arc<AlertDispatcher>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (session, state_rx) = MediaSession::new(
            stream.clone(),
            config.session.clone(),
            connector,
            links,
            events,
            shutdown_rx.clone(),
        );

        let attempt_gauge = Arc::new(AtomicU32::new(0));

        let supervisor = Self {
            session,
            retry: RetryContext::new(config.max_attempts),
            backoff: config.backoff.policy(),
            throttle: NotificationThrottle::new(config.alert_cooldown()),
            dispatcher,
            shutdown: shutdown_rx,
            attempt_gauge: attempt_gauge.clone(),
        };

        let task = tokio::spawn(supervisor.supervise());

        SupervisorHandle {
            stream,
            shutdown: shutdown_tx,
            state: state_rx,
            attempt: attempt_gauge,
            task,
        }
    }

    async fn supervise(mut self) {
        let stream_id = self.session.stream().stream_id.clone();
        let mut shutdown = self.shutdown.clone();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.session.set_attempt(self.retry.attempt);
            let outcome = self.session.run().await;

            if self.session.connected_last_attempt() {
                // a successful reconnection earns a fresh retry budget
                self.retry.reset();
                self.publish_attempt();
            }

            match outcome {
                SessionOutcome::Cancelled => {
                    debug!(stream = %stream_id, "session cancelled");
                    break;
                }
                outcome => {
                    if !self.retry.exhausted() {
                        self.retry.attempt += 1;
                        self.retry.next_delay = self.backoff.delay(self.retry.attempt);
                        self.publish_attempt();

                        info!(
                            stream = %stream_id,
                            kind = outcome.label(),
                            attempt = self.retry.attempt,
                            max_attempts = self.retry.max_attempts,
                            delay = ?self.retry.next_delay,
                            "session failed, retrying"
                        );

                        tokio::select! {
                            _ = tokio::time::sleep(self.retry.next_delay) => {}
                            _ = wait_shutdown(&mut shutdown) => break,
                        }
                    } else {
                        warn!(
                            stream = %stream_id,
                            kind = outcome.label(),
                            attempts = self.retry.attempt,
                            "retry budget exhausted, giving up"
                        );

                        tokio::select! {
                            _ = self.maybe_alert(&stream_id) => {}
                            _ = wait_shutdown(&mut shutdown) => break,
                        }

                        // stay in the terminal failed state until torn down
                        wait_shutdown(&mut shutdown).await;
                        break;
                    }
                }
            }
        }

        self.session.close().await;
    }

    /// Fire the throttled unavailability alert, at most once per window
    ///
    /// Delivery failures are logged by the dispatcher and never influence
    /// session state.
    async fn maybe_alert(&mut self, stream_id: &crate::config::StreamId) {
        let now = Instant::now();
        if !self.throttle.should_fire(now) {
            debug!(stream = %stream_id, "alert suppressed by cooldown");
            return;
        }

        let alert = CameraAlert::new(stream_id.clone(), self.retry.attempt);
        self.dispatcher.dispatch(&alert).await;
        self.throttle.mark_fired(now);
    }

    fn publish_attempt(&self) {
        self.attempt_gauge
            .store(self.retry.attempt, Ordering::SeqCst);
    }
}

/// Handle to a running [`SessionSupervisor`]
pub struct SupervisorHandle {
    stream: CameraStreamRef,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SessionState>,
    attempt: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// The stream this supervisor serves
    pub fn stream(&self) -> &CameraStreamRef {
        &self.stream
    }

    /// Latest session state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Current reconnection attempt counter
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Tear the session down and wait for the task to finish
    ///
    /// Unblocks any in-flight negotiation, backoff wait, or signaling read
    /// immediately; no timers or transports survive.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(stream = %self.stream.stream_id, "supervisor task join error: {}", e);
        }
    }
}

/// Resolve once the shutdown flag flips to true (or the sender is gone)
async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
