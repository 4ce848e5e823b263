//! User-facing notifications raised by voice input.

use std::fmt;
use std::sync::Mutex;

/// Something the user should be told about, without blocking the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// This system has no speech recognition.
    CapabilityMissing,
    /// A recognition session failed.
    RecognitionFailed { code: String, message: String },
    /// A transcript arrived while another question was in flight.
    TranscriptDropped { transcript: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CapabilityMissing => {
                write!(f, "Speech recognition is not supported on this system.")
            }
            Notice::RecognitionFailed { code, message } if message.is_empty() => {
                write!(f, "Speech recognition error: {}", code)
            }
            Notice::RecognitionFailed { code, message } => {
                write!(f, "Speech recognition error: {} ({})", code, message)
            }
            Notice::TranscriptDropped { transcript } => write!(
                f,
                "Still waiting for the previous answer; \"{}\" was not sent.",
                transcript
            ),
        }
    }
}

/// Delivers notices to the user. Must return promptly.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that keeps every notice, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}
