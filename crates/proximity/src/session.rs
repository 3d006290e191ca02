//! Per-device radio session state machine

use serde::Serialize;
use std::fmt;

/// Lifecycle of one radio session against one physical address.
///
/// `Disconnected` and `Errored` are terminal; `Errored` and `Disconnected`
/// are reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Idle,
    Discovering,
    Connecting,
    NegotiatingLink,
    ReadingIdentity,
    Sampling,
    Disconnected,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Errored)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Errored) | (_, Disconnected) => true,
            (Idle, Discovering)
            | (Discovering, Connecting)
            | (Connecting, NegotiatingLink)
            | (NegotiatingLink, ReadingIdentity)
            | (ReadingIdentity, Sampling) => true,
            _ => false,
        }
    }

    /// Advance to `next`, returning the new state, or `None` when the
    /// transition is not part of the protocol.
    pub fn transition(self, next: SessionState) -> Option<SessionState> {
        self.can_transition_to(next).then_some(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
