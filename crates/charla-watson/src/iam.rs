//! API key to bearer token exchange.
//!
//! The token endpoint hands out tokens that live about an hour. One token is
//! cached per authenticator and refreshed shortly before it expires.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use charla_core::error::{CharlaError, Result};

use crate::http::{check_status, transport_error};

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
/// Refresh this long before the upstream expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Used when the token response carries no `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Exchanges an API key for bearer tokens and caches the result.
pub struct IamAuthenticator {
    api_key: String,
    iam_url: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for IamAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamAuthenticator")
            .field("iam_url", &self.iam_url)
            .finish_non_exhaustive()
    }
}

impl IamAuthenticator {
    pub fn new(api_key: String, iam_url: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CharlaError::Config("API key must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CharlaError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            iam_url,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, fetching a new one if needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Forget the token after a service answered 401. The failed request is
    /// not retried.
    pub(crate) async fn observe_status(&self, status: reqwest::StatusCode) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("Bearer token rejected, dropping cached token");
            self.invalidate().await;
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        tracing::debug!(url = %self.iam_url, "Requesting IAM token");

        let resp = self
            .http
            .post(&self.iam_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("IAM token service", e))?;

        let resp = check_status("IAM token service", resp).await?;
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| transport_error("IAM token service", e))?;

        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);

        let now = Instant::now();
        let expires_at = now
            .checked_add(lifetime)
            .unwrap_or(now + DEFAULT_LIFETIME);

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at,
        })
    }
}
