//! Charla audio crate - WAV container handling for voice turns.
//!
//! Audio capture itself is a host concern. This crate takes whatever the
//! host recorded or was uploaded, decodes it, and re-encodes it as the
//! 16 kHz, 16-bit, mono WAV the transcription service expects.

pub mod clip;
pub mod error;

pub use clip::{AudioClip, TARGET_SAMPLE_RATE, TARGET_SAMPLE_WIDTH};
pub use error::AudioError;

/// Decode arbitrary WAV bytes and re-encode them for transcription.
pub fn transcription_wav(bytes: &[u8]) -> Result<Vec<u8>, AudioError> {
    let clip = AudioClip::from_wav_bytes(bytes)?;
    clip.prepare_for_transcription().to_wav_bytes()
}
