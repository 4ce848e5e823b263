//! Error types for voice input.

use parley_core::error::ParleyError;

use crate::state::VoiceState;

/// A failure reported by the speech recognition capability.
///
/// `code` is the platform's short error identifier (for example `no-speech`
/// or `exit-2`), `message` the human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RecognitionError {
    pub code: String,
    pub message: String,
}

impl RecognitionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The session ended without hearing anything.
    pub fn no_speech() -> Self {
        Self::new("no-speech", "no speech was detected")
    }
}

/// Errors returned by the voice input adapter.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognition is not available on this system")]
    Unavailable,
    #[error("a question is already in flight")]
    Busy,
    #[error("speech recognition error: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("invalid voice state transition: {from} -> {to}")]
    InvalidTransition { from: VoiceState, to: VoiceState },
}

impl From<VoiceError> for ParleyError {
    fn from(err: VoiceError) -> Self {
        ParleyError::Voice(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_error_display() {
        let err = RecognitionError::new("network", "recognizer offline");
        assert_eq!(err.to_string(), "network: recognizer offline");
        assert_eq!(RecognitionError::no_speech().code, "no-speech");
    }

    #[test]
    fn test_voice_error_display() {
        assert_eq!(
            VoiceError::Unavailable.to_string(),
            "speech recognition is not available on this system"
        );
        assert_eq!(VoiceError::Busy.to_string(), "a question is already in flight");

        let err: VoiceError = RecognitionError::new("audio-capture", "no mic").into();
        assert_eq!(
            err.to_string(),
            "speech recognition error: audio-capture: no mic"
        );

        let err = VoiceError::InvalidTransition {
            from: VoiceState::Idle,
            to: VoiceState::Error,
        };
        assert_eq!(err.to_string(), "invalid voice state transition: Idle -> Error");
    }

    #[test]
    fn test_voice_error_into_parley_error() {
        let err: ParleyError = VoiceError::Busy.into();
        assert!(matches!(err, ParleyError::Voice(_)));
    }
}
