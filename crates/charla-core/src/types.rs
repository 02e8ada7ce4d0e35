use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Utterances
// =============================================================================

/// Where an utterance came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceSource {
    /// Typed by the user.
    Typed,
    /// Produced by the transcription service.
    Transcribed,
}

/// Raw user input, immutable once captured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    text: String,
    source: UtteranceSource,
}

impl Utterance {
    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: UtteranceSource::Typed,
        }
    }

    pub fn transcribed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: UtteranceSource::Transcribed,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> UtteranceSource {
        self.source
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Opaque identifier of a conversation held by the dialogue service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Body returned by the dialogue service's create-session call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// In-memory record of a conversation known to the session broker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSession {
    pub handle: SessionHandle,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Number of turns dispatched on this handle.
    pub turns: u64,
}

impl ConversationSession {
    pub fn new(handle: SessionHandle) -> Self {
        let now = Utc::now();
        Self {
            handle,
            created_at: now,
            last_active_at: now,
            turns: 0,
        }
    }
}

// =============================================================================
// Outbound message
// =============================================================================

/// Optional behaviours requested from the dialogue service.
///
/// These are opaque pass-through flags; nothing is implemented locally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOptions {
    pub return_context: bool,
    pub smart_formatting: bool,
}

/// The `input` object of a send-message call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInput {
    pub message_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<MessageOptions>,
}

impl MessageInput {
    /// A plain text message with no options.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_type: "text".to_string(),
            text: text.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: MessageOptions) -> Self {
        self.options = Some(options);
        self
    }
}

// =============================================================================
// Dialogue reply
// =============================================================================

/// One labelled option of a suggestion item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionOption {
    pub label: String,
}

/// A single entry of `output.generic` in a dialogue reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum OutputItem {
    Text {
        text: String,
    },
    Suggestion {
        title: String,
        #[serde(default)]
        suggestions: Vec<SuggestionOption>,
    },
    /// Any other response type. Carried so item positions stay stable, but
    /// never rendered.
    #[serde(other)]
    Unsupported,
}

/// Structured reply from the dialogue service.
///
/// `raw` is the untouched upstream body; it is what HTTP callers receive.
/// `items` is the parsed view of `output.generic`.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueReply {
    items: Vec<OutputItem>,
    raw: serde_json::Value,
}

impl DialogueReply {
    /// Parse the routable parts of an upstream reply body.
    ///
    /// A body without `output.generic` has no items. Items whose shape does
    /// not match their declared type are kept as [`OutputItem::Unsupported`].
    pub fn from_value(raw: serde_json::Value) -> Self {
        let items = raw
            .pointer("/output/generic")
            .and_then(|g| g.as_array())
            .map(|generic| {
                generic
                    .iter()
                    .map(|item| {
                        serde_json::from_value::<OutputItem>(item.clone()).unwrap_or_else(|e| {
                            tracing::debug!(error = %e, "Skipping malformed reply item");
                            OutputItem::Unsupported
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { items, raw }
    }

    /// Build a reply whose raw body is `{"output": {"generic": items}}`.
    pub fn from_items(items: Vec<OutputItem>) -> Self {
        let raw = serde_json::json!({ "output": { "generic": items } });
        Self { items, raw }
    }

    pub fn items(&self) -> &[OutputItem] {
        &self.items
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn into_raw(self) -> serde_json::Value {
        self.raw
    }
}

impl Serialize for DialogueReply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DialogueReply {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

// =============================================================================
// Transcription
// =============================================================================

/// Audio submitted for transcription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub model: String,
}

impl AudioPayload {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "audio/wav";
    pub const DEFAULT_MODEL: &'static str = "es-ES_BroadbandModel";

    /// WAV audio for the default Spanish broadband model.
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: Self::DEFAULT_CONTENT_TYPE.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// One hypothesis for a recognised stretch of audio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

/// Body returned by the transcription service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResults {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_index: Option<u32>,
}

impl RecognitionResults {
    /// Results holding a single alternative with the given transcript.
    pub fn single(transcript: impl Into<String>) -> Self {
        Self {
            results: vec![RecognitionResult {
                alternatives: vec![Alternative {
                    transcript: transcript.into(),
                    confidence: None,
                }],
                is_final: true,
            }],
            result_index: Some(0),
        }
    }

    /// Transcript of the first alternative of the first result, if any.
    pub fn first_transcript(&self) -> Option<&str> {
        self.results
            .first()
            .and_then(|r| r.alternatives.first())
            .map(|a| a.transcript.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
