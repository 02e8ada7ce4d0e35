//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use charla_chat::ConversationOrchestrator;
use charla_core::config::CharlaConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CharlaConfig>,
    /// Turn flow for every endpoint, built with the HTTP profile.
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: CharlaConfig, orchestrator: ConversationOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }
}
