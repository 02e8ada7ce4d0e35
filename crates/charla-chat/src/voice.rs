//! Voice turns: audio in, transcript out.

use std::sync::Arc;
use std::time::Duration;

use charla_core::services::TranscriptionService;
use charla_core::types::AudioPayload;

use crate::error::ChatError;

/// Wraps a [`TranscriptionService`] with a deadline and result extraction.
pub struct VoicePipeline {
    service: Arc<dyn TranscriptionService>,
    timeout: Duration,
}

impl VoicePipeline {
    pub fn new(service: Arc<dyn TranscriptionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Transcript of the first alternative of the first result.
    pub async fn transcribe(&self, audio: &AudioPayload) -> Result<String, ChatError> {
        let results = tokio::time::timeout(self.timeout, self.service.transcribe(audio))
            .await
            .map_err(|_| {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Transcription timed out");
                ChatError::Upstream(format!(
                    "speech service did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                tracing::warn!(error = %e, "Transcription request failed");
                ChatError::from(e)
            })?;

        let transcript = results
            .first_transcript()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::Transcription("no speech was recognised".to_string()))?;

        tracing::debug!(chars = transcript.chars().count(), "Audio transcribed");
        Ok(transcript.to_string())
    }
}
