//! Answer Service contract and its HTTP client.
//!
//! The service takes a single question and returns a single answer. It sees
//! no conversation context: every call is independent.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::ChatError;

/// Request body sent to the Answer Service.
#[derive(Debug, Serialize)]
pub struct AnswerRequest<'a> {
    pub question: &'a str,
}

/// Response body expected from the Answer Service.
#[derive(Debug, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Maps a question to an answer.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, ChatError>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Answer Service reached with a JSON `POST` to a fixed endpoint.
pub struct HttpAnswerService {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAnswerService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn ask(&self, question: &str) -> Result<String, ChatError> {
        tracing::debug!(endpoint = %self.endpoint, "Sending question to answer service");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&AnswerRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: AnswerResponse = serde_json::from_str(&body)?;
        tracing::debug!(answer_len = parsed.answer.len(), "Answer received");
        Ok(parsed.answer)
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

type ReplyFn = Box<dyn Fn(&str) -> Result<String, ChatError> + Send + Sync>;

/// Scripted Answer Service for tests and offline runs.
///
/// Records every question it is asked. When gated, each call waits for one
/// `notify_one` on the gate before replying, which lets a test hold a
/// submission in flight.
pub struct MockAnswerService {
    reply: ReplyFn,
    gate: Option<Arc<Notify>>,
    asked: Mutex<Vec<String>>,
}

impl MockAnswerService {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Result<String, ChatError> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            gate: None,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `answer`.
    pub fn answering(answer: impl Into<String>) -> Self {
        let answer = answer.into();
        Self::new(move |_| Ok(answer.clone()))
    }

    /// Answers with the question itself.
    pub fn echo() -> Self {
        Self::new(|q| Ok(q.to_string()))
    }

    /// Always fails with a transport error.
    pub fn failing(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move |_| Err(ChatError::Transport(reason.clone())))
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Questions received so far, in call order.
    pub fn questions(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.asked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl AnswerService for MockAnswerService {
    async fn ask(&self, question: &str) -> Result<String, ChatError> {
        self.asked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(question.to_string());
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        (self.reply)(question)
    }
}
