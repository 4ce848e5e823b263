//! Parley Voice crate - speech recognition sessions feeding the session controller.
//!
//! A [`VoiceInputAdapter`] runs at most one recognition session at a time
//! through a strict state machine: Idle -> Listening -> (Idle | Error -> Idle).
//! A session's first final transcript is submitted as a question; failures
//! become user notices instead of history entries.

pub mod adapter;
pub mod command;
pub mod error;
pub mod notice;
pub mod recognizer;
pub mod state;

pub use adapter::{VoiceActivation, VoiceInputAdapter, VoiceOutcome};
pub use command::CommandRecognizer;
pub use error::{RecognitionError, VoiceError};
pub use notice::{Notice, Notifier, RecordingNotifier};
pub use recognizer::{
    MockRecognizer, RecognitionCallback, RecognitionConfig, RecognitionResult,
    RecognitionSession, SpeechRecognizer, UnavailableRecognizer,
};
pub use state::{StateMachine, VoiceState};
