use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{ChatEntry, InputSource, Timestamp};

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything observable that happens during a chat session.
///
/// Events are emitted by the session controller and the voice adapter after
/// each state change and consumed by the console renderer and by tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    // =========================================================================
    // Submission Events
    // =========================================================================
    /// The in-flight flag changed.
    BusyChanged { busy: bool, timestamp: Timestamp },

    /// A question was accepted and sent to the Answer Service.
    QuestionSubmitted {
        question: String,
        source: InputSource,
        timestamp: Timestamp,
    },

    /// An entry was appended to the history at `index`.
    EntryAppended {
        index: usize,
        entry: ChatEntry,
        timestamp: Timestamp,
    },

    /// The Answer Service failed; the entry carries the error sentinel.
    SubmissionFailed {
        question: String,
        reason: String,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Voice Events
    // =========================================================================
    /// A recognition session started listening.
    RecognitionStarted {
        session_id: Uuid,
        language: String,
        timestamp: Timestamp,
    },

    /// A recognition session yielded its transcript.
    RecognitionCompleted {
        session_id: Uuid,
        transcript: String,
        timestamp: Timestamp,
    },

    /// A recognition session was stopped before yielding anything.
    RecognitionStopped { session_id: Uuid, timestamp: Timestamp },

    /// A recognition session ended with an error.
    RecognitionFailed {
        session_id: Uuid,
        code: String,
        message: String,
        timestamp: Timestamp,
    },
}

impl SessionEvent {
    /// Get the timestamp of this event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            SessionEvent::BusyChanged { timestamp, .. }
            | SessionEvent::QuestionSubmitted { timestamp, .. }
            | SessionEvent::EntryAppended { timestamp, .. }
            | SessionEvent::SubmissionFailed { timestamp, .. }
            | SessionEvent::RecognitionStarted { timestamp, .. }
            | SessionEvent::RecognitionCompleted { timestamp, .. }
            | SessionEvent::RecognitionStopped { timestamp, .. }
            | SessionEvent::RecognitionFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get a short name for this event type (for logging).
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::BusyChanged { .. } => "busy_changed",
            SessionEvent::QuestionSubmitted { .. } => "question_submitted",
            SessionEvent::EntryAppended { .. } => "entry_appended",
            SessionEvent::SubmissionFailed { .. } => "submission_failed",
            SessionEvent::RecognitionStarted { .. } => "recognition_started",
            SessionEvent::RecognitionCompleted { .. } => "recognition_completed",
            SessionEvent::RecognitionStopped { .. } => "recognition_stopped",
            SessionEvent::RecognitionFailed { .. } => "recognition_failed",
        }
    }
}

/// Fan-out channel for session events.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// simply dropped, and slow subscribers observe a lag instead of stalling the
/// publisher.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        tracing::trace!(event = event.event_name(), "Session event");
        // An error only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}
