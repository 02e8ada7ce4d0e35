//! Charla Watson crate - HTTP clients for the hosted dialogue and speech services.
//!
//! Both clients authenticate with an API key that is exchanged for a
//! short-lived bearer token ([`IamAuthenticator`]) and implement the
//! service traits from `charla-core`, so hosts can swap them for mocks.

pub mod assistant;
mod http;
pub mod iam;
pub mod speech;

use std::sync::Arc;

use charla_core::config::CharlaConfig;
use charla_core::error::Result;

pub use assistant::AssistantClient;
pub use iam::IamAuthenticator;
pub use speech::SpeechToTextClient;

/// Build both clients from a validated configuration.
pub fn clients_from_config(config: &CharlaConfig) -> Result<(AssistantClient, SpeechToTextClient)> {
    let assistant_auth = Arc::new(IamAuthenticator::new(
        config.assistant.api_key.clone(),
        config.auth.iam_url.clone(),
    )?);
    let speech_auth = Arc::new(IamAuthenticator::new(
        config.speech.api_key.clone(),
        config.auth.iam_url.clone(),
    )?);

    let assistant = AssistantClient::new(&config.assistant, assistant_auth)?;
    let speech = SpeechToTextClient::new(&config.speech, speech_auth)?;
    Ok((assistant, speech))
}
