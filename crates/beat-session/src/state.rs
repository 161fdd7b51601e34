use std::fmt;

use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Start,
    StoreOpening,
    StoreReady,
    TreeOpening,
    TreeReady,
    Ingesting,
    Listing,
    Reading,
    Pinning,
    Sharing,
    NetworkJoining,
    NetworkConfigured,
    Downloading,
    ServingHttp,
    Closing,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal step.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,

            (Start, StoreOpening) => true,
            (StoreOpening, StoreReady) => true,
            (StoreReady, TreeOpening) => true,
            (TreeOpening, TreeReady) => true,
            (TreeReady, Ingesting | Listing | Reading | Pinning | Sharing | Closing) => true,
            (Pinning | Sharing, NetworkJoining) => true,
            (NetworkJoining, NetworkConfigured) => true,
            (NetworkConfigured, Downloading | ServingHttp) => true,
            (Ingesting | Listing | Reading | Downloading | ServingHttp, Closing) => true,
            (Closing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks and validates session transitions.
#[derive(Clone, Debug)]
pub struct StateMachine {
    state: SessionState,
    history: Vec<SessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Start,
            history: vec![SessionState::Start],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state visited so far, oldest first.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn advance(&mut self, next: SessionState) -> SessionResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "session transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Whether the session ever reached `state`.
    pub fn visited(&self, state: SessionState) -> bool {
        self.history.contains(&state)
    }
}
