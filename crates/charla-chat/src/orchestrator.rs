//! Conversation orchestrator: one turn flow shared by every host.
//!
//! A turn is normalize → resolve session → dispatch → record. Hosts differ
//! only in their [`TurnProfile`], so the HTTP server and the console run the
//! same code with different normalization and upstream options.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use charla_core::config::CharlaConfig;
use charla_core::services::{DialogueService, TranscriptionService};
use charla_core::types::{AudioPayload, DialogueReply, SessionHandle, Utterance};

use crate::broker::SessionBroker;
use crate::dispatcher::{ReplyDispatcher, TurnOptions};
use crate::error::ChatError;
use crate::normalizer::{normalize, JoinStyle, NormalizerOptions};
use crate::voice::VoicePipeline;

const EXIT_WORDS: &[&str] = &["exit", "quit", "salir"];

/// Normalization and upstream options applied to every turn of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnProfile {
    pub normalizer: NormalizerOptions,
    pub turn: TurnOptions,
}

impl TurnProfile {
    /// HTTP endpoints: case preserved, space-joined, no upstream options.
    pub fn http() -> Self {
        Self {
            normalizer: NormalizerOptions {
                lowercase: false,
                join: JoinStyle::Space,
            },
            turn: TurnOptions::default(),
        }
    }

    /// Desktop-style chat: lower-cased and concatenated.
    pub fn desktop() -> Self {
        Self {
            normalizer: NormalizerOptions {
                lowercase: true,
                join: JoinStyle::Concatenate,
            },
            turn: TurnOptions::default(),
        }
    }

    /// Interactive console: lower-cased, space-joined, context echo and
    /// smart formatting requested.
    pub fn console() -> Self {
        Self {
            normalizer: NormalizerOptions {
                lowercase: true,
                join: JoinStyle::Space,
            },
            turn: TurnOptions {
                request_context_echo: true,
                request_smart_formatting: true,
            },
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: SessionHandle,
    /// Text actually sent upstream.
    pub normalized_text: String,
    pub reply: DialogueReply,
}

/// Result of a completed voice turn.
#[derive(Debug, Clone)]
pub struct VoiceOutcome {
    pub transcript: String,
    pub turn: TurnOutcome,
}

/// Timeouts and identifiers the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub assistant_id: String,
    pub assistant_timeout: Duration,
    /// How long an unused session record stays in the broker.
    pub session_idle_timeout: Duration,
    pub speech_timeout: Duration,
    pub speech_model: String,
    pub speech_content_type: String,
}

impl OrchestratorSettings {
    pub fn from_config(config: &CharlaConfig) -> Self {
        Self {
            assistant_id: config.assistant.assistant_id.clone(),
            assistant_timeout: Duration::from_secs(config.assistant.timeout_secs),
            session_idle_timeout: Duration::from_secs(config.assistant.session_idle_secs),
            speech_timeout: Duration::from_secs(config.speech.timeout_secs),
            speech_model: config.speech.model.clone(),
            speech_content_type: config.speech.content_type.clone(),
        }
    }
}

/// Coordinates normalizer, broker, dispatcher and voice pipeline.
pub struct ConversationOrchestrator {
    profile: TurnProfile,
    broker: SessionBroker,
    dispatcher: ReplyDispatcher,
    voice: VoicePipeline,
    speech_model: String,
    speech_content_type: String,
}

impl ConversationOrchestrator {
    pub fn new(
        dialogue: Arc<dyn DialogueService>,
        transcription: Arc<dyn TranscriptionService>,
        settings: OrchestratorSettings,
        profile: TurnProfile,
    ) -> Self {
        let broker = SessionBroker::new(
            dialogue.clone(),
            settings.assistant_id.clone(),
            settings.assistant_timeout,
        )
        .with_idle_timeout(settings.session_idle_timeout);
        let dispatcher = ReplyDispatcher::new(
            dialogue,
            settings.assistant_id,
            profile.turn,
            settings.assistant_timeout,
        );
        let voice = VoicePipeline::new(transcription, settings.speech_timeout);

        Self {
            profile,
            broker,
            dispatcher,
            voice,
            speech_model: settings.speech_model,
            speech_content_type: settings.speech_content_type,
        }
    }

    pub fn profile(&self) -> TurnProfile {
        self.profile
    }

    pub fn broker(&self) -> &SessionBroker {
        &self.broker
    }

    /// Wrap raw audio bytes with the configured model and content type.
    pub fn audio_payload(&self, bytes: Vec<u8>) -> AudioPayload {
        AudioPayload::wav(bytes)
            .with_model(self.speech_model.clone())
            .with_content_type(self.speech_content_type.clone())
    }

    /// Run one text turn, creating a session when `session` is absent.
    pub async fn handle_text(
        &self,
        utterance: Utterance,
        session: Option<&str>,
    ) -> Result<TurnOutcome, ChatError> {
        if utterance.text().trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let normalized_text = normalize(utterance.text(), &self.profile.normalizer);
        let session_id = self.broker.resolve_session(session).await?;
        let reply = self.dispatcher.send_turn(&session_id, &normalized_text).await?;
        self.broker.record_turn(&session_id);

        tracing::debug!(
            session_id = %session_id,
            source = ?utterance.source(),
            items = reply.items().len(),
            "Turn completed"
        );

        Ok(TurnOutcome {
            session_id,
            normalized_text,
            reply,
        })
    }

    /// Transcribe `audio`, then run the transcript as a text turn.
    pub async fn handle_voice(
        &self,
        audio: AudioPayload,
        session: Option<&str>,
    ) -> Result<VoiceOutcome, ChatError> {
        let transcript = self.transcribe(&audio).await?;
        let turn = self
            .handle_text(Utterance::transcribed(transcript.clone()), session)
            .await?;
        Ok(VoiceOutcome { transcript, turn })
    }

    /// Transcribe `audio` without dispatching the transcript.
    pub async fn transcribe(&self, audio: &AudioPayload) -> Result<String, ChatError> {
        self.voice.transcribe(audio).await
    }

    /// Create a session up front, as the console does on start.
    pub async fn open_session(&self) -> Result<SessionHandle, ChatError> {
        self.broker.resolve_session(None).await
    }

    pub async fn close_session(&self, session: &SessionHandle) -> Result<(), ChatError> {
        self.broker.close_session(session).await
    }
}

/// True for the words that end an interactive conversation.
pub fn is_exit_command(text: &str) -> bool {
    let text = text.trim();
    EXIT_WORDS.iter().any(|word| word.eq_ignore_ascii_case(text))
}
