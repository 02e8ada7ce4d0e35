//! Route handler functions for all API endpoints.
//!
//! Text and voice turns both run through the shared orchestrator; the
//! response carries the upstream reply body untouched plus the session id the
//! client should send on its next turn.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use charla_core::types::{SessionHandle, Utterance};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Request body for POST /send_message.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Upstream reply body, relayed verbatim.
    pub response: serde_json::Value,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureVoiceResponse {
    pub response: serde_json::Value,
    pub session_id: String,
    /// What the speech service heard, before normalization.
    pub transcript: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub closed: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: u64,
}

// =============================================================================
// Conversation endpoints
// =============================================================================

/// POST /send_message - run one typed turn.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let Json(request) = payload?;
    let message = request
        .message
        .ok_or_else(|| ApiError::BadRequest("missing field `message`".to_string()))?;

    let outcome = state
        .orchestrator
        .handle_text(Utterance::typed(message), request.session_id.as_deref())
        .await?;

    Ok(Json(SendMessageResponse {
        response: outcome.reply.into_raw(),
        session_id: outcome.session_id.to_string(),
    }))
}

/// POST /capture_voice - transcribe an uploaded clip and run it as a turn.
///
/// Multipart fields: `file` (audio bytes, required) and `session_id`
/// (optional).
pub async fn capture_voice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CaptureVoiceResponse>, ApiError> {
    let max_bytes = state.config.server.max_audio_bytes;
    let mut audio: Option<(Vec<u8>, Option<String>)> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::PayloadTooLarge(format!(
                        "audio upload of {} bytes exceeds the limit of {} bytes",
                        bytes.len(),
                        max_bytes
                    )));
                }
                audio = Some((bytes.to_vec(), content_type));
            }
            Some("session_id") => {
                session_id = Some(field.text().await?);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let (bytes, content_type) =
        audio.ok_or_else(|| ApiError::BadRequest("missing multipart field `file`".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    let mut payload = state.orchestrator.audio_payload(bytes);
    if let Some(content_type) = content_type.filter(|ct| ct.starts_with("audio/")) {
        payload = payload.with_content_type(content_type);
    }

    let outcome = state
        .orchestrator
        .handle_voice(payload, session_id.as_deref())
        .await?;

    Ok(Json(CaptureVoiceResponse {
        response: outcome.turn.reply.into_raw(),
        session_id: outcome.turn.session_id.to_string(),
        transcript: outcome.transcript,
    }))
}

/// DELETE /sessions/{id} - end an upstream session.
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CloseSessionResponse>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("session id must not be empty".to_string()));
    }
    let handle = SessionHandle::new(id);
    state.orchestrator.close_session(&handle).await?;

    Ok(Json(CloseSessionResponse {
        closed: true,
        session_id: handle.to_string(),
    }))
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness plus a count of sessions seen by this process.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.broker().len() as u64,
    })
}
