//! Capability contracts for the external collaborators.
//!
//! Concrete clients live in `charla-watson`; in-memory doubles live in
//! [`crate::mock`]. Both are constructed by the host and injected as
//! `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AudioPayload, CreateSessionResponse, DialogueReply, MessageInput, RecognitionResults,
    SessionHandle,
};

/// External system that holds multi-turn conversational state.
#[async_trait]
pub trait DialogueService: Send + Sync {
    /// Open a new session for the given assistant.
    async fn create_session(&self, assistant_id: &str) -> Result<CreateSessionResponse>;

    /// Send one user turn and return the structured reply.
    async fn send_message(
        &self,
        assistant_id: &str,
        session: &SessionHandle,
        input: &MessageInput,
    ) -> Result<DialogueReply>;

    /// Close a session.
    async fn delete_session(&self, assistant_id: &str, session: &SessionHandle) -> Result<()>;
}

/// External system that converts audio to text.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<RecognitionResults>;
}
