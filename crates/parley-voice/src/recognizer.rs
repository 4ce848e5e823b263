//! Speech recognition capability contract.
//!
//! A recognizer opens single-shot sessions. Each session reports at most one
//! outcome through its [`RecognitionCallback`]: the first final transcript, or
//! an error. A session that is stopped reports nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use parley_core::config::VoiceConfig;
use tokio::sync::oneshot;

use crate::error::RecognitionError;

/// Outcome of one recognition session.
pub type RecognitionResult = Result<String, RecognitionError>;

/// Settings passed to the recognizer for each session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// BCP-47 locale, e.g. `en-US`.
    pub language: String,
    /// Keep listening after the first utterance. Always `false` here.
    pub continuous: bool,
    /// Report partial results. Always `false` here.
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: false,
            interim_results: false,
        }
    }
}

impl From<&VoiceConfig> for RecognitionConfig {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            language: config.language.clone(),
            ..Self::default()
        }
    }
}

/// One-shot delivery point for a session's outcome.
///
/// Consuming `self` on delivery is what makes a session single-shot: later
/// results have nowhere to go. Dropping it undelivered signals that the
/// session ended without an outcome.
#[derive(Debug)]
pub struct RecognitionCallback {
    tx: oneshot::Sender<RecognitionResult>,
}

impl RecognitionCallback {
    /// Create a callback and the receiver the adapter awaits.
    pub fn channel() -> (Self, oneshot::Receiver<RecognitionResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn transcript(self, text: impl Into<String>) {
        self.deliver(Ok(text.into()));
    }

    pub fn error(self, err: RecognitionError) {
        self.deliver(Err(err));
    }

    pub fn deliver(self, result: RecognitionResult) {
        if self.tx.send(result).is_err() {
            tracing::debug!("Recognition outcome dropped: receiver gone");
        }
    }
}

/// Platform speech-to-text capability.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether this system can recognize speech at all.
    fn is_available(&self) -> bool;

    /// Open a session. The outcome is reported through `callback`.
    fn start(
        &self,
        config: &RecognitionConfig,
        callback: RecognitionCallback,
    ) -> Result<Box<dyn RecognitionSession>, RecognitionError>;
}

/// Handle on one open recognition session.
pub trait RecognitionSession: Send {
    /// Stop listening. The session will not report an outcome afterwards.
    /// Calling it more than once is harmless.
    fn stop(&mut self);
}

// =============================================================================
// Unavailable
// =============================================================================

/// Recognizer for systems without speech recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(
        &self,
        _config: &RecognitionConfig,
        _callback: RecognitionCallback,
    ) -> Result<Box<dyn RecognitionSession>, RecognitionError> {
        Err(RecognitionError::new(
            "not-supported",
            "speech recognition is not available",
        ))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    pending: Vec<(usize, RecognitionCallback)>,
    configs: Vec<RecognitionConfig>,
    started: usize,
    stopped: usize,
    active: usize,
    max_active: usize,
    fail_start: Option<RecognitionError>,
}

/// Recognizer driven by the test: sessions stay open until the test delivers
/// a transcript or an error to the most recent one.
///
/// Tracks how many sessions are open at once so tests can check that no two
/// sessions ever overlap.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    available: bool,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            available: true,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Make the next `start` fail with `err`.
    pub fn fail_next_start(&self, err: RecognitionError) {
        self.lock().fail_start = Some(err);
    }

    /// Deliver a transcript to the newest open session.
    /// Returns `false` when no session is open.
    pub fn deliver_transcript(&self, text: &str) -> bool {
        self.deliver(Ok(text.to_string()))
    }

    /// Deliver an error to the newest open session.
    pub fn deliver_error(&self, code: &str, message: &str) -> bool {
        self.deliver(Err(RecognitionError::new(code, message)))
    }

    /// End the newest open session without any outcome.
    pub fn end_silently(&self) -> bool {
        let mut state = self.lock();
        match state.pending.pop() {
            Some(_) => {
                state.active -= 1;
                true
            }
            None => false,
        }
    }

    pub fn started(&self) -> usize {
        self.lock().started
    }

    pub fn stopped(&self) -> usize {
        self.lock().stopped
    }

    /// Sessions currently open.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Highest number of sessions ever open at the same time.
    pub fn max_active(&self) -> usize {
        self.lock().max_active
    }

    /// Configs passed to each `start`, oldest first.
    pub fn configs(&self) -> Vec<RecognitionConfig> {
        self.lock().configs.clone()
    }

    fn deliver(&self, result: RecognitionResult) -> bool {
        let callback = {
            let mut state = self.lock();
            match state.pending.pop() {
                Some((_, callback)) => {
                    state.active -= 1;
                    callback
                }
                None => return false,
            }
        };
        callback.deliver(result);
        true
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(
        &self,
        config: &RecognitionConfig,
        callback: RecognitionCallback,
    ) -> Result<Box<dyn RecognitionSession>, RecognitionError> {
        let mut state = self.lock();
        if let Some(err) = state.fail_start.take() {
            return Err(err);
        }
        state.started += 1;
        let id = state.started;
        state.configs.push(config.clone());
        state.pending.push((id, callback));
        state.active += 1;
        state.max_active = state.max_active.max(state.active);
        Ok(Box::new(MockSession {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

impl RecognitionSession for MockSession {
    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = state.pending.iter().position(|(id, _)| *id == self.id) {
            state.pending.remove(pos);
            state.active -= 1;
            state.stopped += 1;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
