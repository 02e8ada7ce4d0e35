//! Session broker: creates upstream sessions on demand and tracks the ones
//! this process has seen.
//!
//! Records are kept only while they are in use. A caller-supplied handle is
//! recorded once a turn on it succeeds, and any record idle for longer than
//! the idle timeout is dropped the next time the map is touched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use charla_core::services::DialogueService;
use charla_core::types::{ConversationSession, SessionHandle};

use crate::error::ChatError;

/// Default idle timeout, the upstream session inactivity limit.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolves session handles against the dialogue service.
///
/// A caller-supplied handle is trusted as-is. Only an absent or blank handle
/// causes a `create_session` call, and the broker never rewrites a handle it
/// has handed out.
pub struct SessionBroker {
    service: Arc<dyn DialogueService>,
    assistant_id: String,
    timeout: Duration,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, ConversationSession>>,
}

impl SessionBroker {
    pub fn new(
        service: Arc<dyn DialogueService>,
        assistant_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            assistant_id: assistant_id.into(),
            timeout,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Forget records that saw no activity for `idle_timeout`.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Return the existing handle, or create a new upstream session.
    pub async fn resolve_session(&self, existing: Option<&str>) -> Result<SessionHandle, ChatError> {
        if let Some(id) = existing.filter(|id| !id.trim().is_empty()) {
            return Ok(SessionHandle::new(id));
        }

        let created = tokio::time::timeout(
            self.timeout,
            self.service.create_session(&self.assistant_id),
        )
        .await
        .map_err(|_| {
            tracing::warn!(timeout_secs = self.timeout.as_secs(), "Session creation timed out");
            ChatError::Upstream(format!(
                "session creation timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            tracing::warn!(error = %e, "Session creation failed");
            ChatError::from(e)
        })?;

        let id = created
            .session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                tracing::warn!("Session creation response carried no session_id");
                ChatError::Upstream("session creation returned no session_id".to_string())
            })?;

        let handle = SessionHandle::new(id);
        self.track(&handle);
        tracing::info!(session_id = %handle, "Created conversation session");
        Ok(handle)
    }

    /// Delete the upstream session. The local record is dropped even when the
    /// upstream call fails.
    pub async fn close_session(&self, handle: &SessionHandle) -> Result<(), ChatError> {
        match self.sessions.lock() {
            Ok(mut sessions) => {
                sessions.remove(handle.as_str());
            }
            Err(e) => tracing::error!("Session lock poisoned: {}", e),
        }

        let result = tokio::time::timeout(
            self.timeout,
            self.service.delete_session(&self.assistant_id, handle),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(session_id = %handle, "Closed conversation session");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %handle, error = %e, "Session close failed");
                Err(ChatError::from(e))
            }
            Err(_) => {
                tracing::warn!(session_id = %handle, "Session close timed out");
                Err(ChatError::Upstream(format!(
                    "session close timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }

    /// Count a completed turn against the session's record.
    pub fn record_turn(&self, handle: &SessionHandle) {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Session lock poisoned: {}", e);
                return;
            }
        };
        self.evict_idle(&mut sessions);
        let record = sessions
            .entry(handle.as_str().to_string())
            .or_insert_with(|| ConversationSession::new(handle.clone()));
        record.turns += 1;
        record.last_active_at = Utc::now();
    }

    /// Snapshot of known sessions, most recently active first.
    pub fn sessions(&self) -> Vec<ConversationSession> {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Session lock poisoned: {}", e);
                return Vec::new();
            }
        };
        self.evict_idle(&mut sessions);
        let mut list: Vec<ConversationSession> = sessions.values().cloned().collect();
        list.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        list
    }

    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(mut sessions) => {
                self.evict_idle(&mut sessions);
                sessions.len()
            }
            Err(e) => {
                tracing::error!("Session lock poisoned: {}", e);
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    fn track(&self, handle: &SessionHandle) {
        match self.sessions.lock() {
            Ok(mut sessions) => {
                self.evict_idle(&mut sessions);
                sessions
                    .entry(handle.as_str().to_string())
                    .or_insert_with(|| ConversationSession::new(handle.clone()));
            }
            Err(e) => tracing::error!("Session lock poisoned: {}", e),
        }
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, ConversationSession>) {
        let Some(cutoff) = chrono::Duration::from_std(self.idle_timeout)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return;
        };

        let before = sessions.len();
        sessions.retain(|_, record| record.last_active_at > cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted idle session records");
        }
    }
}
