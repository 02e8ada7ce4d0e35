//! Dialogue service client (assistant v2 REST API).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

use charla_core::config::AssistantConfig;
use charla_core::error::{CharlaError, Result};
use charla_core::services::DialogueService;
use charla_core::types::{CreateSessionResponse, DialogueReply, MessageInput, SessionHandle};

use crate::http::{check_status, transport_error};
use crate::iam::IamAuthenticator;

const SERVICE: &str = "assistant";

/// HTTP client for the hosted dialogue service.
#[derive(Debug)]
pub struct AssistantClient {
    base_url: Url,
    version: String,
    http: reqwest::Client,
    auth: Arc<IamAuthenticator>,
}

impl AssistantClient {
    pub fn new(config: &AssistantConfig, auth: Arc<IamAuthenticator>) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CharlaError::Config(
                "assistant.url must not be empty".to_string(),
            ));
        }
        let base_url = Url::parse(config.url.trim())
            .map_err(|e| CharlaError::Config(format!("invalid assistant.url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CharlaError::Config(format!(
                "invalid assistant.url: {}",
                config.url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CharlaError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            version: config.version.clone(),
            http,
            auth,
        })
    }

    /// Append `segments` to the base URL. Each one is percent-encoded as a
    /// single path segment, so `/`, `?` and `#` inside an id stay inside it.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CharlaError::Config("assistant.url cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn sessions_url(&self, assistant_id: &str) -> Result<Url> {
        self.endpoint(&["v2", "assistants", assistant_id, "sessions"])
    }

    fn session_url(
        &self,
        assistant_id: &str,
        session: &SessionHandle,
        tail: Option<&str>,
    ) -> Result<Url> {
        let id = session.as_str();
        // Dot segments are dropped by URL path handling and would address
        // the parent resource.
        if matches!(id.trim(), "" | "." | "..") {
            return Err(CharlaError::Upstream(format!("invalid session id {:?}", id)));
        }
        let mut segments = vec!["v2", "assistants", assistant_id, "sessions", id];
        segments.extend(tail);
        self.endpoint(&segments)
    }
}

#[async_trait]
impl DialogueService for AssistantClient {
    async fn create_session(&self, assistant_id: &str) -> Result<CreateSessionResponse> {
        let url = self.sessions_url(assistant_id)?;
        let token = self.auth.token().await?;
        let resp = self
            .http
            .post(url)
            .query(&[("version", self.version.as_str())])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        self.auth.observe_status(resp.status()).await;

        check_status(SERVICE, resp)
            .await?
            .json::<CreateSessionResponse>()
            .await
            .map_err(|e| transport_error(SERVICE, e))
    }

    async fn send_message(
        &self,
        assistant_id: &str,
        session: &SessionHandle,
        input: &MessageInput,
    ) -> Result<DialogueReply> {
        let url = self.session_url(assistant_id, session, Some("message"))?;
        let token = self.auth.token().await?;
        let resp = self
            .http
            .post(url)
            .query(&[("version", self.version.as_str())])
            .bearer_auth(token)
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        self.auth.observe_status(resp.status()).await;

        let body: serde_json::Value = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        Ok(DialogueReply::from_value(body))
    }

    async fn delete_session(&self, assistant_id: &str, session: &SessionHandle) -> Result<()> {
        let url = self.session_url(assistant_id, session, None)?;
        let token = self.auth.token().await?;
        let resp = self
            .http
            .delete(url)
            .query(&[("version", self.version.as_str())])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        self.auth.observe_status(resp.status()).await;

        check_status(SERVICE, resp).await?;
        Ok(())
    }
}
