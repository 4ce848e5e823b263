//! Voice input adapter: turns one spoken utterance into one submitted question.
//!
//! The adapter owns the only recognition session. Starting a new one always
//! stops the previous one first, so two sessions never feed the same
//! controller. Every session ends in a single resumption point
//! ([`VoiceInputAdapter::finish`]) that performs the state transition and, for
//! a transcript, hands it to the session controller.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use parley_chat::{SessionController, SubmitOutcome};
use parley_core::events::SessionEvent;
use parley_core::types::InputSource;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{RecognitionError, VoiceError};
use crate::notice::{Notice, Notifier};
use crate::recognizer::{
    RecognitionCallback, RecognitionConfig, RecognitionResult, RecognitionSession,
    SpeechRecognizer,
};
use crate::state::{StateMachine, VoiceState};

/// How a recognition session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// The transcript was handed to the session controller.
    Submitted {
        transcript: String,
        outcome: SubmitOutcome,
    },
    /// Recognition failed; nothing was submitted.
    Failed(RecognitionError),
    /// The session closed without a transcript or an error.
    Ended,
    /// The session was stopped or replaced before it reported.
    Superseded,
}

/// A started recognition session.
#[derive(Debug)]
pub struct VoiceActivation {
    session_id: Uuid,
    completion: JoinHandle<VoiceOutcome>,
}

impl VoiceActivation {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait until the session has been fully handled, including the
    /// submission of its transcript.
    pub async fn finished(self) -> VoiceOutcome {
        match self.completion.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(session_id = %self.session_id, error = %e, "Voice completion task failed");
                VoiceOutcome::Superseded
            }
        }
    }
}

struct ActiveSession {
    id: Uuid,
    handle: Box<dyn RecognitionSession>,
}

/// Bridges the speech recognizer to the session controller.
pub struct VoiceInputAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    controller: Arc<SessionController>,
    notifier: Arc<dyn Notifier>,
    config: RecognitionConfig,
    state: StateMachine,
    active: Mutex<Option<ActiveSession>>,
}

impl std::fmt::Debug for VoiceInputAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceInputAdapter")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("available", &self.recognizer.is_available())
            .finish()
    }
}

impl VoiceInputAdapter {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        controller: Arc<SessionController>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            recognizer,
            controller,
            notifier,
            config: RecognitionConfig::default(),
            state: StateMachine::new(),
            active: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: RecognitionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> VoiceState {
        self.state.current()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == VoiceState::Listening
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Start listening for one utterance.
    ///
    /// Any session already listening is stopped first. Fails without touching
    /// the current session when a question is in flight, and fails with a
    /// user notice when the system has no speech recognition.
    pub fn start(self: &Arc<Self>) -> Result<VoiceActivation, VoiceError> {
        if self.controller.is_busy() {
            tracing::info!("Voice input rejected: a question is already in flight");
            return Err(VoiceError::Busy);
        }

        if !self.recognizer.is_available() {
            tracing::warn!("Speech recognition unavailable");
            self.notifier.notify(Notice::CapabilityMissing);
            return Err(VoiceError::Unavailable);
        }

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            self.close(previous);
        }

        let (callback, rx) = RecognitionCallback::channel();
        let mut handle = match self.recognizer.start(&self.config, callback) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(code = %e.code, message = %e.message, "Recognition session failed to start");
                self.notifier.notify(Notice::RecognitionFailed {
                    code: e.code.clone(),
                    message: e.message.clone(),
                });
                return Err(e.into());
            }
        };

        if let Err(e) = self.state.transition(VoiceState::Listening) {
            handle.stop();
            return Err(e);
        }

        let session_id = Uuid::new_v4();
        *active = Some(ActiveSession {
            id: session_id,
            handle,
        });
        drop(active);

        tracing::info!(%session_id, language = %self.config.language, "Recognition session started");
        self.controller.events().publish(SessionEvent::RecognitionStarted {
            session_id,
            language: self.config.language.clone(),
            timestamp: Utc::now(),
        });

        let adapter = Arc::clone(self);
        let completion = tokio::spawn(async move {
            let result = rx.await;
            adapter.finish(session_id, result).await
        });

        Ok(VoiceActivation {
            session_id,
            completion,
        })
    }

    /// Stop the listening session, if any. Returns whether one was stopped.
    pub fn stop(&self) -> bool {
        let mut active = self.lock_active();
        match active.take() {
            Some(session) => {
                self.close(session);
                true
            }
            None => false,
        }
    }

    // -- Private helpers --

    async fn finish(
        &self,
        session_id: Uuid,
        result: Result<RecognitionResult, oneshot::error::RecvError>,
    ) -> VoiceOutcome {
        let transcript = {
            let mut active = self.lock_active();
            if !matches!(active.as_ref(), Some(session) if session.id == session_id) {
                tracing::debug!(%session_id, "Ignoring outcome from a replaced session");
                return VoiceOutcome::Superseded;
            }
            *active = None;

            match result {
                Ok(Ok(transcript)) => {
                    self.enter(VoiceState::Idle);
                    tracing::info!(%session_id, transcript_len = transcript.len(), "Speech transcribed");
                    self.controller.events().publish(SessionEvent::RecognitionCompleted {
                        session_id,
                        transcript: transcript.clone(),
                        timestamp: Utc::now(),
                    });
                    transcript
                }
                Ok(Err(e)) => {
                    self.enter(VoiceState::Error);
                    tracing::warn!(%session_id, code = %e.code, message = %e.message, "Speech recognition failed");
                    self.controller.events().publish(SessionEvent::RecognitionFailed {
                        session_id,
                        code: e.code.clone(),
                        message: e.message.clone(),
                        timestamp: Utc::now(),
                    });
                    self.notifier.notify(Notice::RecognitionFailed {
                        code: e.code.clone(),
                        message: e.message.clone(),
                    });
                    self.enter(VoiceState::Idle);
                    return VoiceOutcome::Failed(e);
                }
                Err(_) => {
                    self.enter(VoiceState::Idle);
                    tracing::info!(%session_id, "Recognition session ended without a result");
                    self.controller.events().publish(SessionEvent::RecognitionStopped {
                        session_id,
                        timestamp: Utc::now(),
                    });
                    return VoiceOutcome::Ended;
                }
            }
        };

        let outcome = self
            .controller
            .submit_from(&transcript, InputSource::Voice)
            .await;
        if outcome == SubmitOutcome::Busy {
            self.notifier.notify(Notice::TranscriptDropped {
                transcript: transcript.clone(),
            });
        }
        VoiceOutcome::Submitted {
            transcript,
            outcome,
        }
    }

    fn close(&self, mut session: ActiveSession) {
        session.handle.stop();
        self.enter(VoiceState::Idle);
        tracing::info!(session_id = %session.id, "Recognition session stopped");
        self.controller.events().publish(SessionEvent::RecognitionStopped {
            session_id: session.id,
            timestamp: Utc::now(),
        });
    }

    fn enter(&self, target: VoiceState) {
        if let Err(e) = self.state.transition(target) {
            tracing::error!(error = %e, "Voice state out of sync");
            self.state.reset();
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
