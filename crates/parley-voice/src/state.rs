//! Voice input state machine with thread-safe transitions.
//!
//! Enforces valid state transitions for one recognition activation:
//! - Idle -> Listening (session started)
//! - Listening -> Idle (transcript received, or session stopped)
//! - Listening -> Error (recognition failed)
//! - Error -> Idle (failure reported, ready again)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::VoiceError;

/// Operational state of the voice input adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceState {
    /// No recognition session. Ready to start.
    Idle,
    /// A recognition session is waiting for speech.
    Listening,
    /// The last session failed; the failure is being reported.
    Error,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceState::Idle => write!(f, "Idle"),
            VoiceState::Listening => write!(f, "Listening"),
            VoiceState::Error => write!(f, "Error"),
        }
    }
}

impl VoiceState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoiceState) -> bool {
        matches!(
            (self, target),
            (VoiceState::Idle, VoiceState::Listening)
                | (VoiceState::Listening, VoiceState::Idle)
                | (VoiceState::Listening, VoiceState::Error)
                | (VoiceState::Error, VoiceState::Idle)
        )
    }
}

/// Thread-safe state machine for voice state transitions.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<VoiceState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VoiceState::Idle)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> VoiceState {
        *self.lock()
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: VoiceState) -> Result<(), VoiceError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            tracing::debug!("Voice state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(VoiceError::InvalidTransition {
                from: *state,
                to: target,
            })
        }
    }

    /// Force the state machine back to Idle (used for error recovery).
    pub fn reset(&self) {
        let mut state = self.lock();
        if *state != VoiceState::Idle {
            tracing::warn!("Voice state machine reset to Idle from {}", *state);
        }
        *state = VoiceState::Idle;
    }

    /// The state is a plain `Copy` value, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VoiceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(VoiceState::Idle.to_string(), "Idle");
        assert_eq!(VoiceState::Listening.to_string(), "Listening");
        assert_eq!(VoiceState::Error.to_string(), "Error");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(VoiceState::Idle.can_transition_to(&VoiceState::Listening));
        assert!(VoiceState::Listening.can_transition_to(&VoiceState::Idle));
        assert!(VoiceState::Listening.can_transition_to(&VoiceState::Error));
        assert!(VoiceState::Error.can_transition_to(&VoiceState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        // Errors only come out of a live session
        assert!(!VoiceState::Idle.can_transition_to(&VoiceState::Error));
        // Error must pass through Idle before listening again
        assert!(!VoiceState::Error.can_transition_to(&VoiceState::Listening));

        assert!(!VoiceState::Idle.can_transition_to(&VoiceState::Idle));
        assert!(!VoiceState::Listening.can_transition_to(&VoiceState::Listening));
        assert!(!VoiceState::Error.can_transition_to(&VoiceState::Error));
    }

    #[test]
    fn test_state_machine_transcript_path() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), VoiceState::Idle);

        sm.transition(VoiceState::Listening).unwrap();
        assert_eq!(sm.current(), VoiceState::Listening);

        sm.transition(VoiceState::Idle).unwrap();
        assert_eq!(sm.current(), VoiceState::Idle);
    }

    #[test]
    fn test_state_machine_error_path() {
        let sm = StateMachine::new();
        sm.transition(VoiceState::Listening).unwrap();
        sm.transition(VoiceState::Error).unwrap();
        sm.transition(VoiceState::Idle).unwrap();
        sm.transition(VoiceState::Listening).unwrap();
        assert_eq!(sm.current(), VoiceState::Listening);
    }

    #[test]
    fn test_state_machine_invalid_transition_keeps_state() {
        let sm = StateMachine::new();
        let result = sm.transition(VoiceState::Error);
        assert!(result.is_err());
        assert_eq!(sm.current(), VoiceState::Idle);
    }

    #[test]
    fn test_state_machine_transition_error_names_states() {
        let sm = StateMachine::new();
        match sm.transition(VoiceState::Error) {
            Err(VoiceError::InvalidTransition { from, to }) => {
                assert_eq!(from, VoiceState::Idle);
                assert_eq!(to, VoiceState::Error);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_state_machine_reset() {
        let sm = StateMachine::new();
        sm.transition(VoiceState::Listening).unwrap();
        sm.transition(VoiceState::Error).unwrap();
        sm.reset();
        assert_eq!(sm.current(), VoiceState::Idle);
    }

    #[test]
    fn test_state_machine_clone_is_shared() {
        let sm1 = StateMachine::new();
        let sm2 = sm1.clone();

        sm1.transition(VoiceState::Listening).unwrap();
        assert_eq!(sm2.current(), VoiceState::Listening);
    }
}
