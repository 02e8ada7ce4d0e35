//! Sends one normalized utterance to the dialogue service.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use charla_core::services::DialogueService;
use charla_core::types::{DialogueReply, MessageInput, MessageOptions, SessionHandle};

use crate::error::ChatError;

/// Upstream options requested on every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnOptions {
    /// Ask the service to echo conversation context in the reply.
    pub request_context_echo: bool,
    pub request_smart_formatting: bool,
}

impl TurnOptions {
    /// Wire options, or `None` when nothing is requested.
    pub fn message_options(&self) -> Option<MessageOptions> {
        if !self.request_context_echo && !self.request_smart_formatting {
            return None;
        }
        Some(MessageOptions {
            return_context: self.request_context_echo,
            smart_formatting: self.request_smart_formatting,
        })
    }
}

pub struct ReplyDispatcher {
    service: Arc<dyn DialogueService>,
    assistant_id: String,
    options: TurnOptions,
    timeout: Duration,
}

impl ReplyDispatcher {
    pub fn new(
        service: Arc<dyn DialogueService>,
        assistant_id: impl Into<String>,
        options: TurnOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            assistant_id: assistant_id.into(),
            options,
            timeout,
        }
    }

    pub fn options(&self) -> TurnOptions {
        self.options
    }

    /// Send `text` as a text message on `session`.
    ///
    /// A failure leaves the handle usable; the next turn on it is sent as
    /// normal.
    pub async fn send_turn(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<DialogueReply, ChatError> {
        let mut input = MessageInput::text(text);
        if let Some(options) = self.options.message_options() {
            input = input.with_options(options);
        }

        tracing::debug!(session_id = %session, chars = text.chars().count(), "Dispatching turn");

        match tokio::time::timeout(
            self.timeout,
            self.service.send_message(&self.assistant_id, session, &input),
        )
        .await
        {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session, error = %e, "Turn dispatch failed");
                Err(ChatError::from(e))
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %session,
                    timeout_secs = self.timeout.as_secs(),
                    "Turn dispatch timed out"
                );
                Err(ChatError::Upstream(format!(
                    "assistant did not answer within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charla_core::mock::MockDialogueService;
    use charla_core::types::OutputItem;

    fn dispatcher(mock: &Arc<MockDialogueService>, options: TurnOptions) -> ReplyDispatcher {
        ReplyDispatcher::new(mock.clone(), "asst-1", options, Duration::from_secs(5))
    }

    #[test]
    fn test_message_options_omitted_when_unset() {
        assert_eq!(TurnOptions::default().message_options(), None);

        let opts = TurnOptions {
            request_context_echo: true,
            request_smart_formatting: false,
        };
        assert_eq!(
            opts.message_options(),
            Some(MessageOptions {
                return_context: true,
                smart_formatting: false,
            })
        );
    }

    #[tokio::test]
    async fn test_send_turn_builds_text_input() {
        let mock = Arc::new(MockDialogueService::new());
        let d = dispatcher(&mock, TurnOptions::default());
        let session = SessionHandle::new("s1");

        let reply = d.send_turn(&session, "quiero 2 cafés").await.unwrap();
        assert_eq!(
            reply.items(),
            &[OutputItem::Text {
                text: "quiero 2 cafés".into()
            }]
        );

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, session);
        assert_eq!(sent[0].1.message_type, "text");
        assert_eq!(sent[0].1.options, None);
    }

    #[tokio::test]
    async fn test_send_turn_maps_flags_to_options() {
        let mock = Arc::new(MockDialogueService::new());
        let d = dispatcher(
            &mock,
            TurnOptions {
                request_context_echo: true,
                request_smart_formatting: true,
            },
        );

        d.send_turn(&SessionHandle::new("s1"), "hola").await.unwrap();
        let options = mock.sent()[0].1.options.clone();
        assert_eq!(
            options,
            Some(MessageOptions {
                return_context: true,
                smart_formatting: true,
            })
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_the_handle() {
        let mock = Arc::new(MockDialogueService::new());
        mock.fail_next_messages(1);
        let d = dispatcher(&mock, TurnOptions::default());
        let session = SessionHandle::new("s1");

        let err = d.send_turn(&session, "uno").await.unwrap_err();
        assert!(matches!(err, ChatError::Upstream(_)));

        let reply = d.send_turn(&session, "dos").await.unwrap();
        assert_eq!(reply.items().len(), 1);
        assert_eq!(mock.message_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_upstream() {
        let mock =
            Arc::new(MockDialogueService::new().with_delay(Duration::from_secs(120)));
        let d = ReplyDispatcher::new(
            mock.clone(),
            "asst-1",
            TurnOptions::default(),
            Duration::from_secs(30),
        );

        let err = d.send_turn(&SessionHandle::new("s1"), "hola").await.unwrap_err();
        match err {
            ChatError::Upstream(msg) => assert!(msg.contains("30s")),
            other => panic!("expected Upstream, got {:?}", other),
        }
    }
}
