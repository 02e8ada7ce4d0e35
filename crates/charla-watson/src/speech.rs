//! Speech-to-text client (`/v1/recognize`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use charla_core::config::SpeechConfig;
use charla_core::error::{CharlaError, Result};
use charla_core::services::TranscriptionService;
use charla_core::types::{AudioPayload, RecognitionResults};

use crate::http::{check_status, transport_error};
use crate::iam::IamAuthenticator;

const SERVICE: &str = "speech-to-text";

/// HTTP client for one-shot recognition of a complete audio clip.
#[derive(Debug)]
pub struct SpeechToTextClient {
    base_url: String,
    default_model: String,
    default_content_type: String,
    http: reqwest::Client,
    auth: Arc<IamAuthenticator>,
}

impl SpeechToTextClient {
    pub fn new(config: &SpeechConfig, auth: Arc<IamAuthenticator>) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CharlaError::Config("speech.url must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CharlaError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            default_content_type: config.content_type.clone(),
            http,
            auth,
        })
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[async_trait]
impl TranscriptionService for SpeechToTextClient {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<RecognitionResults> {
        if audio.bytes.is_empty() {
            return Err(CharlaError::Transcription("audio payload is empty".to_string()));
        }

        let model = or_default(&audio.model, &self.default_model);
        let content_type = or_default(&audio.content_type, &self.default_content_type);
        tracing::debug!(model, content_type, bytes = audio.bytes.len(), "Sending audio for recognition");

        let token = self.auth.token().await?;
        let resp = self
            .http
            .post(format!("{}/v1/recognize", self.base_url))
            .query(&[("model", model)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(audio.bytes.clone())
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        self.auth.observe_status(resp.status()).await;

        check_status(SERVICE, resp)
            .await?
            .json::<RecognitionResults>()
            .await
            .map_err(|e| transport_error(SERVICE, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> SpeechToTextClient {
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "stt-tok", "expires_in": 3600})),
            )
            .mount(server)
            .await;
        let auth = Arc::new(
            IamAuthenticator::new("key".into(), format!("{}/identity/token", server.uri()))
                .unwrap(),
        );
        let config = SpeechConfig {
            url: server.uri(),
            ..SpeechConfig::default()
        };
        SpeechToTextClient::new(&config, auth).unwrap()
    }

    #[tokio::test]
    async fn test_transcribe_sends_raw_audio() {
        let server = MockServer::start().await;
        let stt = client(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .and(query_param("model", "es-ES_BroadbandModel"))
            .and(header("content-type", "audio/wav"))
            .and(header("authorization", "Bearer stt-tok"))
            .and(body_bytes(b"RIFFfake".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result_index": 0,
                "results": [{
                    "final": true,
                    "alternatives": [{"transcript": "hola buenos días ", "confidence": 0.92}]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = stt
            .transcribe(&AudioPayload::wav(b"RIFFfake".to_vec()))
            .await
            .unwrap();
        assert_eq!(results.first_transcript(), Some("hola buenos días "));
        assert!(results.results[0].is_final);
    }

    #[tokio::test]
    async fn test_payload_model_overrides_default() {
        let server = MockServer::start().await;
        let stt = client(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .and(query_param("model", "es-ES_NarrowbandModel"))
            .and(header("content-type", "audio/flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let payload = AudioPayload::wav(vec![1, 2, 3])
            .with_model("es-ES_NarrowbandModel")
            .with_content_type("audio/flac");
        let results = stt.transcribe(&payload).await.unwrap();
        assert_eq!(results.first_transcript(), None);
    }

    #[tokio::test]
    async fn test_empty_audio_rejected_without_request() {
        let server = MockServer::start().await;
        let stt = client(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = stt.transcribe(&AudioPayload::wav(Vec::new())).await.unwrap_err();
        assert!(matches!(err, CharlaError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_unsupported_audio_is_upstream_error() {
        let server = MockServer::start().await;
        let stt = client(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "Stream was 0 bytes but needs to be at least 100 bytes.",
                "code": 400
            })))
            .mount(&server)
            .await;

        let err = stt.transcribe(&AudioPayload::wav(vec![0; 4])).await.unwrap_err();
        assert!(matches!(err, CharlaError::Upstream(_)));
        assert!(err.to_string().contains("speech-to-text returned 400"));
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default("", "fallback"), "fallback");
        assert_eq!(or_default("  ", "fallback"), "fallback");
        assert_eq!(or_default("value", "fallback"), "value");
    }
}
