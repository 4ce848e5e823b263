//! Session controller: the single entry point for every question.
//!
//! Owns the chat history and the in-flight flag. Typed input and voice
//! transcripts both end up in [`SessionController::submit`], which admits at
//! most one question at a time, waits for the Answer Service, and appends
//! exactly one entry per admitted question.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use parley_core::config::ServiceConfig;
use parley_core::events::{EventBus, SessionEvent};
use parley_core::types::{ChatEntry, InputSource};
use tokio::sync::broadcast;

use crate::answer::{AnswerService, HttpAnswerService};
use crate::error::ChatError;

/// What happened to a call to [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input. Nothing changed.
    Ignored,
    /// Another question is in flight. Nothing changed.
    Busy,
    /// The service answered; the entry was appended.
    Answered(ChatEntry),
    /// The service failed; the sentinel entry was appended.
    Failed(ChatEntry),
}

impl SubmitOutcome {
    /// The appended entry, if any.
    pub fn entry(&self) -> Option<&ChatEntry> {
        match self {
            SubmitOutcome::Answered(entry) | SubmitOutcome::Failed(entry) => Some(entry),
            SubmitOutcome::Ignored | SubmitOutcome::Busy => None,
        }
    }
}

/// Coordinates question submission, history and busy state for one session.
pub struct SessionController {
    service: Arc<dyn AnswerService>,
    history: Mutex<Vec<ChatEntry>>,
    busy: AtomicBool,
    timeout: Option<Duration>,
    events: EventBus,
}

impl SessionController {
    /// Create a controller with no request timeout and its own event bus.
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self {
            service,
            history: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            timeout: None,
            events: EventBus::new(),
        }
    }

    /// Create a controller talking HTTP to the configured endpoint.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let service = Arc::new(HttpAnswerService::new(config.endpoint.trim()));
        let timeout = match config.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        tracing::info!(endpoint = %service.endpoint(), ?timeout, "Answer Service configured");
        Self::new(service).with_timeout(timeout)
    }

    /// Bound every Answer Service call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish on a shared bus instead of a private one.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Submit a typed question.
    pub async fn submit(&self, question: &str) -> SubmitOutcome {
        self.submit_from(question, InputSource::Typed).await
    }

    /// Submit a question from the given input source.
    ///
    /// The visible order for an admitted question is always
    /// `busy=true`, service call, entry appended, `busy=false`.
    pub async fn submit_from(&self, question: &str, source: InputSource) -> SubmitOutcome {
        let question = question.trim();
        if question.is_empty() {
            tracing::debug!(%source, "Ignoring blank question");
            return SubmitOutcome::Ignored;
        }

        let Some(_busy) = BusyGuard::acquire(&self.busy, &self.events) else {
            tracing::info!(%source, "Question rejected: a request is already in flight");
            return SubmitOutcome::Busy;
        };

        tracing::info!(%source, question_len = question.len(), "Question submitted");
        self.events.publish(SessionEvent::QuestionSubmitted {
            question: question.to_string(),
            source,
            timestamp: Utc::now(),
        });

        match self.ask(question).await {
            Ok(answer) => {
                let entry = ChatEntry::new(question, answer);
                self.append(entry.clone());
                SubmitOutcome::Answered(entry)
            }
            Err(e) => {
                tracing::error!(error = %e, question = %question, "Answer service request failed");
                self.events.publish(SessionEvent::SubmissionFailed {
                    question: question.to_string(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                let entry = ChatEntry::failed(question);
                self.append(entry.clone());
                SubmitOutcome::Failed(entry)
            }
        }
    }

    /// Whether a question is awaiting the Answer Service.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<ChatEntry> {
        self.entries().clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Most recently appended entry.
    pub fn last(&self) -> Option<ChatEntry> {
        self.entries().last().cloned()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The bus this controller publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -- Private helpers --

    async fn ask(&self, question: &str) -> Result<String, ChatError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.service.ask(question))
                .await
                .unwrap_or(Err(ChatError::Timeout(limit))),
            None => self.service.ask(question).await,
        }
    }

    fn append(&self, entry: ChatEntry) {
        let index = {
            let mut history = self.entries();
            history.push(entry.clone());
            history.len() - 1
        };
        tracing::debug!(index, failed = entry.is_failure(), "History entry appended");
        self.events.publish(SessionEvent::EntryAppended {
            index,
            entry,
            timestamp: Utc::now(),
        });
    }

    /// History is append-only, so a poisoned lock still holds consistent data.
    fn entries(&self) -> MutexGuard<'_, Vec<ChatEntry>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds the busy flag for one submission and releases it on drop, including
/// when the submitting future is dropped mid-flight.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    events: &'a EventBus,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, events: &'a EventBus) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        events.publish(SessionEvent::BusyChanged {
            busy: true,
            timestamp: Utc::now(),
        });
        Some(Self { flag, events })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.events.publish(SessionEvent::BusyChanged {
            busy: false,
            timestamp: Utc::now(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
