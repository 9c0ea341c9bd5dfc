//! Session state machine and failure classification

use crate::config::StreamId;
use crate::link::RemoteTrackHandle;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one camera session
///
/// The owning [`MediaSession`](super::MediaSession) is the sole writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet negotiating
    Idle,
    /// Description/candidate exchange in progress
    Negotiating,
    /// Media is flowing
    Connected,
    /// Transport lost connectivity, possibly transient
    Degraded,
    /// The attempt failed; the supervisor decides what happens next
    Failed,
    /// Torn down; only a fresh start leaves this state
    Closed,
}

impl SessionState {
    /// Whether the state machine permits moving to `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if next == Closed {
            return self != Closed;
        }

        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Negotiating, Connected)
                | (Negotiating, Failed)
                | (Connected, Degraded)
                | (Degraded, Connected)
                | (Degraded, Failed)
                | (Failed, Negotiating)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Negotiating => "negotiating",
            SessionState::Connected => "connected",
            SessionState::Degraded => "degraded",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How one negotiation attempt ended, delivered at most once per attempt
#[derive(Debug)]
pub enum SessionOutcome {
    /// The negotiation never completed; immediately retryable
    Setup(Error),
    /// The transport degraded after the camera was reachable at least once,
    /// or the signaling channel closed unintentionally
    Connectivity(Error),
    /// The remote side reported an application-level error
    Protocol(String),
    /// Caller-initiated close; never retried
    Cancelled,
}

impl SessionOutcome {
    /// Whether the supervisor may retry after this outcome
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SessionOutcome::Cancelled)
    }

    /// Failure kind for display, `None` for cancellation
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            SessionOutcome::Setup(_) => Some(FailureKind::Setup),
            SessionOutcome::Connectivity(_) => Some(FailureKind::Connectivity),
            SessionOutcome::Protocol(_) => Some(FailureKind::Protocol),
            SessionOutcome::Cancelled => None,
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Setup(_) => "setup",
            SessionOutcome::Connectivity(_) => "connectivity",
            SessionOutcome::Protocol(_) => "protocol",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Failure classification surfaced alongside the `Failed` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Negotiation never completed
    Setup,
    /// Transport degraded after connecting
    Connectivity,
    /// Remote reported an application error
    Protocol,
}

/// One observable step of a camera session, in occurrence order
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Which camera stream
    pub stream_id: StreamId,
    /// New state
    pub state: SessionState,
    /// Reconnection attempt counter at the time of the change
    pub attempt: u32,
    /// The live media track, present on the transition into `Connected`
    pub track: Option<RemoteTrackHandle>,
    /// Failure classification, present on `Failed`
    pub failure: Option<FailureKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Idle.can_transition_to(Negotiating));
        assert!(Negotiating.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Degraded));
        assert!(Degraded.can_transition_to(Connected));
    }

    #[test]
    fn test_failure_transitions() {
        assert!(Negotiating.can_transition_to(Failed));
        assert!(Degraded.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Negotiating));
        assert!(!Connected.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Failed));
    }

    #[test]
    fn test_closed_reachable_from_everywhere_but_final() {
        for state in [Idle, Negotiating, Connected, Degraded, Failed] {
            assert!(state.can_transition_to(Closed));
        }
        assert!(!Closed.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Negotiating));
    }

    #[test]
    fn test_no_shortcut_into_connected() {
        assert!(!Idle.can_transition_to(Connected));
        assert!(!Failed.can_transition_to(Connected));
    }

    #[test]
    fn test_outcome_classification() {
        let setup = SessionOutcome::Setup(Error::Timeout("negotiation".to_string()));
        assert!(setup.is_retryable());
        assert_eq!(setup.kind(), Some(FailureKind::Setup));

        let cancelled = SessionOutcome::Cancelled;
        assert!(!cancelled.is_retryable());
        assert_eq!(cancelled.kind(), None);

        let protocol = SessionOutcome::Protocol("stream offline".to_string());
        assert_eq!(protocol.kind(), Some(FailureKind::Protocol));
        assert_eq!(protocol.label(), "protocol");
    }
}
