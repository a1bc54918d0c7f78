use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Recording = 1,
    Finalizing = 2,
    Completed = 3,
    Cancelled = 4,
    /// An I/O error ended the session; the partial file is left in place
    Failed = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Recording,
            2 => Self::Finalizing,
            3 => Self::Completed,
            4 => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    /// No further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Session state shared between the capture loop and the controller
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_recording(&self) -> bool {
        self.load() == SessionState::Recording
    }

    /// Move from `from` to `to`; on failure returns the state actually found
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_succeeds_from_expected_state() {
        let state = SharedState::new(SessionState::Idle);
        assert!(state.transition(SessionState::Idle, SessionState::Recording).is_ok());
        assert_eq!(state.load(), SessionState::Recording);
        assert!(state.is_recording());
    }

    #[test]
    fn transition_reports_actual_state_on_mismatch() {
        let state = SharedState::new(SessionState::Cancelled);
        let err = state
            .transition(SessionState::Recording, SessionState::Finalizing)
            .unwrap_err();
        assert_eq!(err, SessionState::Cancelled);
        assert_eq!(state.load(), SessionState::Cancelled);
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Recording.is_terminal());
        assert!(!SessionState::Finalizing.is_terminal());
    }

    #[test]
    fn display_matches_serde_names() {
        let json = serde_json::to_string(&SessionState::Finalizing).unwrap();
        assert_eq!(json, format!("\"{}\"", SessionState::Finalizing));
    }
}
