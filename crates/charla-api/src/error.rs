//! API error types and JSON error response formatting.
//!
//! Every failure is returned as `{"error": <code>, "message": <text>}` with a
//! status matching the kind of failure.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use charla_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "upstream_error").
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 - missing or invalid request fields.
    #[error("{0}")]
    BadRequest(String),
    /// 413 - uploaded audio exceeds the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// 500 - the dialogue or speech service failed.
    #[error("{0}")]
    Upstream(String),
    /// 500 - audio was processed but no speech came back.
    #[error("{0}")]
    Transcription(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            ApiError::Transcription(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transcription_error")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: error_code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest(ChatError::EmptyMessage.to_string()),
            ChatError::Upstream(msg) => ApiError::Upstream(msg),
            ChatError::Transcription(msg) => ApiError::Transcription(msg),
            ChatError::Configuration(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}
