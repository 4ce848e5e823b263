//! Question submission for Parley.
//!
//! Provides the session controller that serializes questions from every input
//! source, the Answer Service contract, and its HTTP client.

pub mod answer;
pub mod controller;
pub mod error;

pub use answer::{AnswerService, HttpAnswerService, MockAnswerService};
pub use controller::{SessionController, SubmitOutcome};
pub use error::ChatError;
