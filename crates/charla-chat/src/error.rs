//! Error types for the conversation flow.

use charla_core::error::CharlaError;

/// Errors from a conversation turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("transcription error: {0}")]
    Transcription(String),
    #[error("message cannot be empty")]
    EmptyMessage,
}

impl From<CharlaError> for ChatError {
    fn from(err: CharlaError) -> Self {
        match err {
            CharlaError::Config(msg) => ChatError::Configuration(msg),
            CharlaError::Transcription(msg) => ChatError::Transcription(msg),
            CharlaError::Upstream(msg) => ChatError::Upstream(msg),
            other => ChatError::Upstream(other.to_string()),
        }
    }
}
