//! Error types for audio decoding and encoding.

use charla_core::error::CharlaError;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("invalid WAV data: {0}")]
    InvalidWav(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("audio clip is empty")]
    Empty,
    #[error("WAV encoding failed: {0}")]
    Encode(String),
}

impl From<AudioError> for CharlaError {
    fn from(err: AudioError) -> Self {
        CharlaError::Audio(err.to_string())
    }
}
