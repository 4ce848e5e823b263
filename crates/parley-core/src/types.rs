use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp carried on events.
pub type Timestamp = DateTime<Utc>;

/// Answer recorded when the Answer Service could not produce one.
pub const ANSWER_ERROR_SENTINEL: &str = "Error: Could not get response";

/// One resolved question/answer pair in the session history.
///
/// Entries are created by the session controller and never mutated after
/// being appended, so the fields are only exposed through accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    question: String,
    answer: String,
}

impl ChatEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Entry recorded for a failed submission.
    pub fn failed(question: impl Into<String>) -> Self {
        Self::new(question, ANSWER_ERROR_SENTINEL)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Whether this entry carries the failure sentinel instead of an answer.
    pub fn is_failure(&self) -> bool {
        self.answer == ANSWER_ERROR_SENTINEL
    }
}

/// Where a submitted question came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Typed,
    Voice,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Typed => write!(f, "typed"),
            InputSource::Voice => write!(f, "voice"),
        }
    }
}
