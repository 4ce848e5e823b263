//! Error types for talking to the Answer Service.

use std::time::Duration;

use parley_core::error::ParleyError;

/// Ways a single question can fail to produce an answer.
///
/// The session controller turns every variant into the same sentinel entry;
/// the distinction only matters for logs and events.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("answer service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("answer service error: {0}")]
    Service(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else if err.is_timeout() {
            ChatError::Transport(format!("timed out: {}", err))
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Decode(err.to_string())
    }
}

impl From<ChatError> for ParleyError {
    fn from(err: ChatError) -> Self {
        ParleyError::Chat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = ChatError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "answer service returned status 503: overloaded"
        );

        let err = ChatError::Decode("missing field `answer`".to_string());
        assert_eq!(err.to_string(), "undecodable response: missing field `answer`");

        let err = ChatError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "request timed out after 2s");

        let err = ChatError::Service("boom".to_string());
        assert_eq!(err.to_string(), "answer service error: boom");
    }

    #[test]
    fn test_chat_error_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let chat_err: ChatError = err.into();
        assert!(matches!(chat_err, ChatError::Decode(_)));
    }

    #[test]
    fn test_chat_error_into_parley_error() {
        let err: ParleyError = ChatError::Transport("down".to_string()).into();
        assert!(matches!(err, ParleyError::Chat(_)));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_errors_implement_debug() {
        let dbg = format!("{:?}", ChatError::Timeout(Duration::from_millis(5)));
        assert!(dbg.contains("Timeout"));
    }
}
