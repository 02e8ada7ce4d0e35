use thiserror::Error;

/// Top-level error type for the Charla system.
///
/// Subsystem crates define their own error types and implement
/// `From<CharlaError>` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CharlaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CharlaError {
    fn from(err: toml::de::Error) -> Self {
        CharlaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CharlaError {
    fn from(err: toml::ser::Error) -> Self {
        CharlaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CharlaError {
    fn from(err: serde_json::Error) -> Self {
        CharlaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Charla operations.
pub type Result<T> = std::result::Result<T, CharlaError>;
