use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CharlaError, Result};

/// Environment variable names for the credential settings.
pub const ENV_ASSISTANT_APIKEY: &str = "ASSISTANT_APIKEY";
pub const ENV_ASSISTANT_URL: &str = "ASSISTANT_URL";
pub const ENV_ASSISTANT_ID: &str = "ASSISTANT_ID";
pub const ENV_STT_APIKEY: &str = "STT_APIKEY";
pub const ENV_STT_URL: &str = "STT_URL";
pub const ENV_PORT: &str = "CHARLA_PORT";

/// Top-level configuration for Charla.
///
/// Loaded from `~/.charla/config.toml` by default, then overlaid with the
/// credential environment variables. Each section corresponds to one
/// collaborator or host surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharlaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl CharlaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CharlaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay settings from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay settings from an arbitrary key lookup.
    ///
    /// Blank values are ignored so an empty variable never wipes a value
    /// that came from the config file.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ASSISTANT_APIKEY) {
            self.assistant.api_key = v;
        }
        if let Some(v) = get(ENV_ASSISTANT_URL) {
            self.assistant.url = v;
        }
        if let Some(v) = get(ENV_ASSISTANT_ID) {
            self.assistant.assistant_id = v;
        }
        if let Some(v) = get(ENV_STT_APIKEY) {
            self.speech.api_key = v;
        }
        if let Some(v) = get(ENV_STT_URL) {
            self.speech.url = v;
        }
        if let Some(v) = get(ENV_PORT) {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid {}", ENV_PORT),
            }
        }
    }

    /// Check that every required credential and endpoint is present.
    ///
    /// Fails with [`CharlaError::Config`] naming each missing setting and the
    /// environment variable that supplies it.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("assistant.api_key", ENV_ASSISTANT_APIKEY, &self.assistant.api_key),
            ("assistant.url", ENV_ASSISTANT_URL, &self.assistant.url),
            ("assistant.assistant_id", ENV_ASSISTANT_ID, &self.assistant.assistant_id),
            ("speech.api_key", ENV_STT_APIKEY, &self.speech.api_key),
            ("speech.url", ENV_STT_URL, &self.speech.url),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, _, value)| value.trim().is_empty())
            .map(|(field, env, _)| format!("{} ({})", field, env))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CharlaError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Largest accepted voice upload in bytes.
    pub max_audio_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: Vec::new(),
            max_audio_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Dialogue service (assistant) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub api_key: String,
    /// Service base URL, without the `/v2` path.
    pub url: String,
    pub assistant_id: String,
    /// API version date sent as the `version` query parameter.
    pub version: String,
    pub timeout_secs: u64,
    /// Locally tracked session records idle longer than this are forgotten.
    /// Match it to the upstream session inactivity timeout.
    pub session_idle_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: String::new(),
            assistant_id: String::new(),
            version: "2021-06-14".to_string(),
            timeout_secs: 30,
            session_idle_secs: 300,
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: String,
    pub url: String,
    /// Recognition model name.
    pub model: String,
    /// Content type declared for uploaded audio.
    pub content_type: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: String::new(),
            model: "es-ES_BroadbandModel".to_string(),
            content_type: "audio/wav".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Token exchange settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub iam_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            iam_url: "https://iam.cloud.ibm.com/identity/token".to_string(),
        }
    }
}
