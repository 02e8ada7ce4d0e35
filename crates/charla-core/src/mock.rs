//! In-memory service doubles for tests and offline development.
//!
//! Both mocks count their calls and record what they were sent, so callers
//! can assert on exactly how many external calls a flow made.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{CharlaError, Result};
use crate::services::{DialogueService, TranscriptionService};
use crate::types::{
    AudioPayload, CreateSessionResponse, DialogueReply, MessageInput, OutputItem,
    RecognitionResults, SessionHandle,
};

// =============================================================================
// Dialogue
// =============================================================================

/// Mock dialogue service.
///
/// Sessions get fresh UUIDs. Unless a fixed reply is configured, each
/// message is answered with a single text item echoing the input text.
#[derive(Debug, Default)]
pub struct MockDialogueService {
    create_calls: AtomicUsize,
    message_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_creates: AtomicBool,
    omit_session_id: AtomicBool,
    failing_messages: AtomicUsize,
    fixed_reply: Mutex<Option<DialogueReply>>,
    delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<(SessionHandle, MessageInput)>>,
    deleted: Mutex<Vec<SessionHandle>>,
}

impl MockDialogueService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every message with this reply instead of echoing.
    pub fn with_reply(self, reply: DialogueReply) -> Self {
        if let Ok(mut slot) = self.fixed_reply.lock() {
            *slot = Some(reply);
        }
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    /// Make create-session calls fail with an upstream error.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make create-session calls succeed with a body lacking `session_id`.
    pub fn omit_session_id(&self, omit: bool) {
        self.omit_session_id.store(omit, Ordering::SeqCst);
    }

    /// Make the next `count` send-message calls fail with an upstream error.
    pub fn fail_next_messages(&self, count: usize) {
        self.failing_messages.store(count, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Every (session, input) pair sent so far, in order.
    pub fn sent(&self) -> Vec<(SessionHandle, MessageInput)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Every session deleted so far, in order.
    pub fn deleted(&self) -> Vec<SessionHandle> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    async fn pause(&self) {
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DialogueService for MockDialogueService {
    async fn create_session(&self, _assistant_id: &str) -> Result<CreateSessionResponse> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(CharlaError::Upstream(
                "mock assistant refused to create a session".to_string(),
            ));
        }
        if self.omit_session_id.load(Ordering::SeqCst) {
            return Ok(CreateSessionResponse { session_id: None });
        }
        Ok(CreateSessionResponse {
            session_id: Some(Uuid::new_v4().to_string()),
        })
    }

    async fn send_message(
        &self,
        _assistant_id: &str,
        session: &SessionHandle,
        input: &MessageInput,
    ) -> Result<DialogueReply> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let should_fail = self
            .failing_messages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(CharlaError::Upstream("mock transport failure".to_string()));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push((session.clone(), input.clone()));
        }

        let fixed = self.fixed_reply.lock().ok().and_then(|r| r.clone());
        Ok(fixed.unwrap_or_else(|| {
            DialogueReply::from_items(vec![OutputItem::Text {
                text: input.text.clone(),
            }])
        }))
    }

    async fn delete_session(&self, _assistant_id: &str, session: &SessionHandle) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(session.clone());
        }
        Ok(())
    }
}

// =============================================================================
// Transcription
// =============================================================================

/// Mock transcription service returning a configurable result.
#[derive(Debug)]
pub struct MockTranscriptionService {
    results: Mutex<RecognitionResults>,
    fail: AtomicBool,
    calls: AtomicUsize,
    last_payload: Mutex<Option<AudioPayload>>,
}

impl Default for MockTranscriptionService {
    fn default() -> Self {
        Self::new("[mock transcription]")
    }
}

impl MockTranscriptionService {
    /// Always recognise `transcript`.
    pub fn new(transcript: impl Into<String>) -> Self {
        Self::with_results(RecognitionResults::single(transcript))
    }

    pub fn with_results(results: RecognitionResults) -> Self {
        Self {
            results: Mutex::new(results),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
        }
    }

    /// Recognise nothing: a body with an empty `results` list.
    pub fn silent() -> Self {
        Self::with_results(RecognitionResults::default())
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<AudioPayload> {
        self.last_payload.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<RecognitionResults> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_payload.lock() {
            *last = Some(audio.clone());
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(CharlaError::Upstream(
                "mock speech service unavailable".to_string(),
            ));
        }

        tracing::debug!(bytes = audio.bytes.len(), "Mock transcription generated");

        self.results
            .lock()
            .map(|r| r.clone())
            .map_err(|e| CharlaError::Upstream(format!("mock state poisoned: {}", e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
