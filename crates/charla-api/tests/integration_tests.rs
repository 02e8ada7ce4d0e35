//! Integration tests for the Charla API.
//!
//! Every test builds its own router over in-memory mock services and drives
//! it with `oneshot`, so no network or credentials are involved.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use charla_api::create_router;
use charla_api::handlers::{CaptureVoiceResponse, HealthResponse, SendMessageResponse};
use charla_api::state::AppState;
use charla_chat::{ConversationOrchestrator, OrchestratorSettings, TurnProfile};
use charla_core::config::CharlaConfig;
use charla_core::mock::{MockDialogueService, MockTranscriptionService};
use charla_core::types::{DialogueReply, OutputItem, SuggestionOption};

// =============================================================================
// Helpers
// =============================================================================

const BOUNDARY: &str = "charla-test-boundary";

struct TestApp {
    state: AppState,
    dialogue: Arc<MockDialogueService>,
    speech: Arc<MockTranscriptionService>,
}

fn test_config() -> CharlaConfig {
    let mut config = CharlaConfig::default();
    config.assistant.assistant_id = "asst-test".to_string();
    config.assistant.timeout_secs = 5;
    config.speech.timeout_secs = 5;
    config
}

fn make_test_app_with(
    config: CharlaConfig,
    dialogue: MockDialogueService,
    speech: MockTranscriptionService,
) -> TestApp {
    let dialogue = Arc::new(dialogue);
    let speech = Arc::new(speech);
    let orchestrator = ConversationOrchestrator::new(
        dialogue.clone(),
        speech.clone(),
        OrchestratorSettings::from_config(&config),
        TurnProfile::http(),
    );
    TestApp {
        state: AppState::new(config, orchestrator),
        dialogue,
        speech,
    }
}

fn make_test_app() -> TestApp {
    make_test_app_with(
        test_config(),
        MockDialogueService::new(),
        MockTranscriptionService::new("quiero dos cafés"),
    )
}

fn app(test: &TestApp) -> axum::Router {
    create_router(test.state.clone())
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Build a multipart/form-data body from (name, filename, bytes) parts.
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: audio/wav\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn post_multipart(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// GET /health
// =============================================================================

#[tokio::test]
async fn test_health_returns_healthy() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let health: HealthResponse = serde_json::from_value(json).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
    assert!(!health.version.is_empty());
}

// =============================================================================
// POST /send_message
// =============================================================================

#[tokio::test]
async fn test_send_message_creates_session_and_relays_reply() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "quiero dos entradas"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: SendMessageResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert!(!body.session_id.is_empty());
    assert_eq!(body.response["output"]["generic"][0]["text"], "quiero 2 entradas");
    assert_eq!(test.dialogue.create_calls(), 1);
}

#[tokio::test]
async fn test_send_message_reuses_given_session() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_json(
            "/send_message",
            r#"{"message": "hola", "session_id": "existing-123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["session_id"], "existing-123");
    assert_eq!(test.dialogue.create_calls(), 0);
    assert_eq!(test.dialogue.sent()[0].0.as_str(), "existing-123");
}

#[tokio::test]
async fn test_send_message_keeps_case_and_spaces() {
    let test = make_test_app();
    app(&test)
        .oneshot(post_json(
            "/send_message",
            r#"{"message": "Mesa para cuatro", "session_id": "s1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(test.dialogue.sent()[0].1.text, "Mesa para 4");
    assert_eq!(test.dialogue.sent()[0].1.options, None);
}

#[tokio::test]
async fn test_send_message_relays_raw_upstream_body() {
    let reply = DialogueReply::from_items(vec![
        OutputItem::Text { text: "Hola".into() },
        OutputItem::Suggestion {
            title: "¿Qué prefieres?".into(),
            suggestions: vec![
                SuggestionOption { label: "Café".into() },
                SuggestionOption { label: "Té".into() },
            ],
        },
    ]);
    let test = make_test_app_with(
        test_config(),
        MockDialogueService::new().with_reply(reply),
        MockTranscriptionService::default(),
    );

    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola", "session_id": "s1"}"#))
        .await
        .unwrap();
    let json = body_json(response).await;

    let generic = &json["response"]["output"]["generic"];
    assert_eq!(generic[1]["response_type"], "suggestion");
    assert_eq!(generic[1]["suggestions"][1]["label"], "Té");
}

#[tokio::test]
async fn test_send_message_missing_message_is_bad_request() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"session_id": "s1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "bad_request");
    assert_eq!(test.dialogue.message_calls(), 0);
}

#[tokio::test]
async fn test_send_message_blank_message_is_bad_request() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "message cannot be empty");
    assert_eq!(test.dialogue.create_calls(), 0);
}

#[tokio::test]
async fn test_send_message_malformed_json_is_bad_request() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_json("/send_message", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_send_message_upstream_failure_is_500() {
    let test = make_test_app();
    test.dialogue.fail_next_messages(1);

    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola", "session_id": "s1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "upstream_error");
    assert!(json["message"].as_str().unwrap().contains("mock transport failure"));

    // The same session keeps working on the next turn.
    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola", "session_id": "s1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_send_message_session_creation_failure_is_500() {
    let test = make_test_app();
    test.dialogue.fail_creates(true);

    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "upstream_error");
    assert_eq!(test.dialogue.message_calls(), 0);
}

#[tokio::test]
async fn test_send_message_timeout_is_500() {
    let mut config = test_config();
    config.assistant.timeout_secs = 1;
    let test = make_test_app_with(
        config,
        MockDialogueService::new().with_delay(Duration::from_secs(3)),
        MockTranscriptionService::default(),
    );

    let response = app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola", "session_id": "s1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "upstream_error");
}

// =============================================================================
// POST /capture_voice
// =============================================================================

#[tokio::test]
async fn test_capture_voice_transcribes_and_dispatches() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[("file", Some("clip.wav"), &b"RIFF....WAVEfmt "[..])],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: CaptureVoiceResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(body.transcript, "quiero dos cafés");
    assert_eq!(body.response["output"]["generic"][0]["text"], "quiero 2 cafés");
    assert!(!body.session_id.is_empty());

    let payload = test.speech.last_payload().unwrap();
    assert_eq!(payload.bytes, b"RIFF....WAVEfmt ".to_vec());
    assert_eq!(payload.model, "es-ES_BroadbandModel");
    assert_eq!(payload.content_type, "audio/wav");
}

#[tokio::test]
async fn test_capture_voice_uses_given_session() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[
                ("session_id", None, &b"voice-session"[..]),
                ("file", Some("clip.wav"), &b"RIFFdata"[..]),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["session_id"], "voice-session");
    assert_eq!(test.dialogue.create_calls(), 0);
}

#[tokio::test]
async fn test_capture_voice_missing_file_is_bad_request() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[("session_id", None, &b"s1"[..])],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
    assert_eq!(test.speech.calls(), 0);
}

#[tokio::test]
async fn test_capture_voice_silence_is_transcription_error() {
    let test = make_test_app_with(
        test_config(),
        MockDialogueService::new(),
        MockTranscriptionService::silent(),
    );
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[("file", Some("clip.wav"), &b"RIFFdata"[..])],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "transcription_error");
    assert_eq!(test.dialogue.message_calls(), 0);
}

#[tokio::test]
async fn test_capture_voice_speech_failure_is_upstream_error() {
    let test = make_test_app();
    test.speech.set_fail(true);
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[("file", Some("clip.wav"), &b"RIFFdata"[..])],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "upstream_error");
}

#[tokio::test]
async fn test_capture_voice_oversized_upload_is_rejected() {
    let mut config = test_config();
    config.server.max_audio_bytes = 16;
    let test = make_test_app_with(
        config,
        MockDialogueService::new(),
        MockTranscriptionService::default(),
    );
    let audio = vec![7u8; 64];
    let response = app(&test)
        .oneshot(post_multipart(
            "/capture_voice",
            &[("file", Some("clip.wav"), audio.as_slice())],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(test.speech.calls(), 0);
}

// =============================================================================
// DELETE /sessions/{id}
// =============================================================================

#[tokio::test]
async fn test_close_session_deletes_upstream() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(
            Request::delete("/sessions/abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["closed"], true);
    assert_eq!(json["session_id"], "abc-123");
    assert_eq!(test.dialogue.deleted()[0].as_str(), "abc-123");
}

#[tokio::test]
async fn test_health_counts_active_sessions() {
    let test = make_test_app();
    app(&test)
        .oneshot(post_json("/send_message", r#"{"message": "hola"}"#))
        .await
        .unwrap();

    let response = app(&test)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["active_sessions"], 1);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let test = make_test_app();
    let response = app(&test)
        .oneshot(
            Request::get("/health")
                .header("origin", "http://frontend.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_cors_restricted_to_configured_origins() {
    let mut config = test_config();
    config.server.allowed_origins = vec!["http://allowed.example".to_string()];
    let test = make_test_app_with(
        config,
        MockDialogueService::new(),
        MockTranscriptionService::default(),
    );

    let allowed = app(&test)
        .oneshot(
            Request::get("/health")
                .header("origin", "http://allowed.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );

    let denied = app(&test)
        .oneshot(
            Request::get("/health")
                .header("origin", "http://other.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}
