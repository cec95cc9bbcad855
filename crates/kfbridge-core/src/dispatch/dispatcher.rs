//! Dispatcher: the per-callback pipeline.
//!
//! `Verify -> Decode -> Classify -> {TextPath | EventPath | Drop}`.
//!
//! Verification failures are the only errors returned to the transport.
//! Everything after a successful decrypt is acknowledged: parse failures and
//! dropped messages are logged, and failures on the text path turn into a
//! best-effort degraded-service notice to the user.

use std::sync::Arc;

use futures_util::StreamExt;

use kfbridge_types::callback::{CallbackEnvelope, CallbackOutcome};
use kfbridge_types::config::{DEFAULT_DEGRADED_TEXT, DEFAULT_WELCOME_TEXT, MessagesConfig};
use kfbridge_types::error::{CallbackError, WorkflowError};
use kfbridge_types::message::{DecodedEvent, LifecycleKind};

use crate::cache::ContextCache;
use crate::callback::CallbackDecryptor;
use crate::context::store::ContextStore;
use crate::message::decoder::{MessageDecoder, log_preview};
use crate::message::sender::MessageSender;
use crate::workflow::gateway::{ConversationCreator, WorkflowGateway};
use crate::workflow::reply::extract_reply;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub welcome_text: String,
    pub degraded_text: String,
    /// Use the streaming workflow endpoint and concatenate chunks.
    pub stream_replies: bool,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            welcome_text: DEFAULT_WELCOME_TEXT.to_string(),
            degraded_text: DEFAULT_DEGRADED_TEXT.to_string(),
            stream_replies: false,
        }
    }
}

impl DispatcherSettings {
    pub fn new(messages: &MessagesConfig, stream_replies: bool) -> Self {
        Self {
            welcome_text: messages.welcome.clone(),
            degraded_text: messages.degraded.clone(),
            stream_replies,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<D, C, G, S> {
    decryptor: Arc<D>,
    contexts: ContextStore<C, G>,
    gateway: Arc<G>,
    sender: Arc<S>,
    settings: DispatcherSettings,
}

impl<D, C, G, S> Dispatcher<D, C, G, S>
where
    D: CallbackDecryptor,
    C: ContextCache,
    G: WorkflowGateway + ConversationCreator,
    S: MessageSender,
{
    pub fn new(
        decryptor: Arc<D>,
        contexts: ContextStore<C, G>,
        gateway: Arc<G>,
        sender: Arc<S>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            decryptor,
            contexts,
            gateway,
            sender,
            settings,
        }
    }

    pub fn decryptor(&self) -> &Arc<D> {
        &self.decryptor
    }

    pub fn contexts(&self) -> &ContextStore<C, G> {
        &self.contexts
    }

    /// Process one encrypted callback end to end.
    pub async fn handle_callback(
        &self,
        envelope: &CallbackEnvelope,
    ) -> Result<CallbackOutcome, CallbackError> {
        let xml = self.decryptor.verify_and_decrypt(envelope)?;

        let event = match MessageDecoder::parse(&xml) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable callback body");
                return Ok(CallbackOutcome::Dropped {
                    reason: e.to_string(),
                });
            }
        };

        let outcome = match MessageDecoder::classify(&event) {
            DecodedEvent::TextMessage {
                external_user_id,
                content,
            } => self.handle_text(&external_user_id, &content).await,
            DecodedEvent::LifecycleEvent {
                external_user_id,
                kind,
            } => self.handle_lifecycle(&external_user_id, kind).await,
            DecodedEvent::Unsupported { raw_type } => {
                tracing::info!(msg_type = %raw_type, "unsupported message type");
                CallbackOutcome::Ignored {
                    reason: format!("unsupported message type '{raw_type}'"),
                }
            }
            DecodedEvent::Dropped { reason } => {
                tracing::info!(%reason, "message dropped");
                CallbackOutcome::Dropped { reason }
            }
        };
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, content), fields(content = %log_preview(content)))]
    async fn handle_text(&self, external_user_id: &str, content: &str) -> CallbackOutcome {
        let Some(context_id) = self.contexts.get_or_create_context(external_user_id).await else {
            tracing::warn!("context unavailable, sending degraded notice");
            self.send_degraded(external_user_id).await;
            return CallbackOutcome::Degraded {
                external_user_id: external_user_id.to_string(),
            };
        };

        let reply = match self.run_workflow(content, &context_id).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                tracing::warn!(%context_id, "workflow produced no output");
                return CallbackOutcome::NoReply {
                    external_user_id: external_user_id.to_string(),
                };
            }
            Err(e) => {
                tracing::error!(%context_id, error = %e, "workflow call failed");
                self.send_degraded(external_user_id).await;
                return CallbackOutcome::Degraded {
                    external_user_id: external_user_id.to_string(),
                };
            }
        };

        if let Err(e) = self.sender.send_text(external_user_id, &reply).await {
            tracing::error!(%context_id, error = %e, "failed to deliver reply");
            self.send_degraded(external_user_id).await;
            return CallbackOutcome::Degraded {
                external_user_id: external_user_id.to_string(),
            };
        }

        tracing::info!(%context_id, reply = %log_preview(&reply), "reply sent");
        CallbackOutcome::Replied {
            external_user_id: external_user_id.to_string(),
            context_id,
        }
    }

    async fn run_workflow(
        &self,
        content: &str,
        context_id: &str,
    ) -> Result<Option<String>, WorkflowError> {
        if self.settings.stream_replies {
            let mut stream = self.gateway.execute_workflow_stream(content, context_id);
            let mut reply = String::new();
            while let Some(chunk) = stream.next().await {
                reply.push_str(&chunk?);
            }
            return Ok((!reply.is_empty()).then_some(reply));
        }

        let result = self.gateway.execute_workflow(content, context_id).await?;
        Ok(result.output.as_ref().map(extract_reply))
    }

    async fn handle_lifecycle(&self, external_user_id: &str, kind: LifecycleKind) -> CallbackOutcome {
        match kind {
            LifecycleKind::Subscribe => {
                if let Err(e) = self
                    .sender
                    .send_text(external_user_id, &self.settings.welcome_text)
                    .await
                {
                    tracing::error!(external_user_id, error = %e, "failed to send welcome text");
                    return CallbackOutcome::Ignored {
                        reason: format!("welcome delivery failed: {e}"),
                    };
                }
                CallbackOutcome::Welcomed {
                    external_user_id: external_user_id.to_string(),
                }
            }
            LifecycleKind::EnterSession => {
                tracing::info!(external_user_id, "user entered session");
                CallbackOutcome::Ignored {
                    reason: kind.to_string(),
                }
            }
            other => {
                tracing::info!(external_user_id, event = %other, "lifecycle event logged");
                CallbackOutcome::Ignored {
                    reason: other.to_string(),
                }
            }
        }
    }

    async fn send_degraded(&self, external_user_id: &str) {
        if let Err(e) = self
            .sender
            .send_text(external_user_id, &self.settings.degraded_text)
            .await
        {
            tracing::error!(external_user_id, error = %e, "failed to send degraded notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use kfbridge_types::workflow::{WorkflowResult, WorkflowStatus};
    use serde_json::json;

    use crate::testing::{MockCache, MockDecryptor, MockGateway, MockSender};

    type TestDispatcher = Dispatcher<MockDecryptor, MockCache, MockGateway, MockSender>;

    struct Harness {
        dispatcher: TestDispatcher,
        cache: Arc<MockCache>,
        gateway: Arc<MockGateway>,
        sender: Arc<MockSender>,
    }

    fn harness(decryptor: MockDecryptor, gateway: MockGateway, settings: DispatcherSettings) -> Harness {
        let cache = Arc::new(MockCache::default());
        let gateway = Arc::new(gateway);
        let sender = Arc::new(MockSender::default());
        let contexts = ContextStore::new(cache.clone(), gateway.clone(), "", Duration::from_secs(60));
        let dispatcher = Dispatcher::new(
            Arc::new(decryptor),
            contexts,
            gateway.clone(),
            sender.clone(),
            settings,
        );
        Harness {
            dispatcher,
            cache,
            gateway,
            sender,
        }
    }

    fn text_xml(user: &str, content: &str) -> String {
        format!(
            "<xml><ToUserName><![CDATA[ww]]></ToUserName><FromUserName><![CDATA[{user}]]></FromUserName>\
             <CreateTime>1</CreateTime><MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[{content}]]></Content></xml>"
        )
    }

    fn event_xml(user: &str, event: &str) -> String {
        format!(
            "<xml><FromUserName>{user}</FromUserName><MsgType>event</MsgType><Event>{event}</Event></xml>"
        )
    }

    fn success(output: serde_json::Value) -> WorkflowResult {
        WorkflowResult {
            workflow_id: Some("wf".into()),
            context_id: None,
            output: output.as_object().cloned(),
            status: WorkflowStatus::Success,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_new_user_text_gets_workflow_reply() {
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new("conv-1", Ok(success(json!({"result": "hi!"})))),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Replied {
                external_user_id: "U1".into(),
                context_id: "conv-1".into()
            }
        );
        assert_eq!(h.gateway.created(), 1);
        assert_eq!(h.gateway.invocations(), vec![("hello".to_string(), "conv-1".to_string())]);
        assert_eq!(h.sender.sent(), vec![("U1".to_string(), "hi!".to_string())]);
        assert!(h.cache.get_raw("context:U1").is_some());
    }

    #[tokio::test]
    async fn test_subscribe_sends_welcome_without_context() {
        let h = harness(
            MockDecryptor::plaintext(event_xml("U2", "subscribe")),
            MockGateway::new("conv-x", Ok(success(json!({})))),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Welcomed {
                external_user_id: "U2".into()
            }
        );
        assert_eq!(h.sender.sent(), vec![("U2".to_string(), DEFAULT_WELCOME_TEXT.to_string())]);
        assert_eq!(h.gateway.created(), 0);
        assert!(h.gateway.invocations().is_empty());
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_welcome_is_not_reported_as_welcomed() {
        let h = harness(
            MockDecryptor::plaintext(event_xml("U2", "subscribe")),
            MockGateway::new("conv-x", Ok(success(json!({})))),
            DispatcherSettings::default(),
        );
        h.sender.fail_first();

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(
            matches!(outcome, CallbackOutcome::Ignored { ref reason } if reason.starts_with("welcome delivery failed")),
            "got {outcome:?}"
        );
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_without_side_effects() {
        let h = harness(
            MockDecryptor::rejecting(),
            MockGateway::new("conv-1", Ok(success(json!({"result": "hi!"})))),
            DispatcherSettings::default(),
        );

        let err = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap_err();
        assert!(matches!(err, CallbackError::Auth(_)));
        assert!(h.cache.is_empty());
        assert_eq!(h.gateway.created(), 0);
        assert!(h.gateway.invocations().is_empty());
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_workflow_failure_sends_degraded_notice() {
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new(
                "conv-1",
                Err(WorkflowError::Http {
                    status: 503,
                    body: "down".into(),
                    retry_after_ms: None,
                }),
            ),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Degraded { .. }));
        assert_eq!(h.sender.sent(), vec![("U1".to_string(), DEFAULT_DEGRADED_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn test_context_unavailable_sends_degraded_notice() {
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new("conv-1", Ok(success(json!({"result": "hi!"})))).failing_creation(),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Degraded { .. }));
        assert!(h.gateway.invocations().is_empty());
        assert_eq!(h.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_output_sends_nothing() {
        let mut result = success(json!({}));
        result.output = None;
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new("conv-1", Ok(result)),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::NoReply { .. }));
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_falls_back_to_degraded_notice() {
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new("conv-1", Ok(success(json!({"result": "hi!"})))),
            DispatcherSettings::default(),
        );
        h.sender.fail_first();

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Degraded { .. }));
        assert_eq!(h.sender.sent(), vec![("U1".to_string(), DEFAULT_DEGRADED_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn test_stream_mode_concatenates_chunks() {
        let settings = DispatcherSettings {
            stream_replies: true,
            ..Default::default()
        };
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "hello")),
            MockGateway::new("conv-1", Ok(success(json!({})))).with_chunks(vec!["hi", " there"]),
            settings,
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Replied { .. }));
        assert_eq!(h.sender.sent(), vec![("U1".to_string(), "hi there".to_string())]);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_acknowledged() {
        let h = harness(
            MockDecryptor::plaintext("<xml><MsgType>text</Oops></xml>".to_string()),
            MockGateway::new("conv-1", Ok(success(json!({})))),
            DispatcherSettings::default(),
        );

        let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Dropped { .. }));
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_other_events_are_logged_only() {
        for event in ["enter_session", "kf_msg_or_event", "unsubscribe"] {
            let h = harness(
                MockDecryptor::plaintext(event_xml("U3", event)),
                MockGateway::new("conv-1", Ok(success(json!({})))),
                DispatcherSettings::default(),
            );
            let outcome = h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
            assert_eq!(
                outcome,
                CallbackOutcome::Ignored {
                    reason: event.to_string()
                }
            );
            assert!(h.sender.sent().is_empty());
        }
    }

    #[tokio::test]
    async fn test_second_message_reuses_context() {
        let h = harness(
            MockDecryptor::plaintext(text_xml("U1", "again")),
            MockGateway::new("conv-1", Ok(success(json!({"answer": "ok"})))),
            DispatcherSettings::default(),
        );

        h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        h.dispatcher.handle_callback(&CallbackEnvelope::default()).await.unwrap();
        assert_eq!(h.gateway.created(), 1);
        let info = h.dispatcher.contexts().get_context_info("U1").await.unwrap().unwrap();
        assert_eq!(info.message_count, 1);
    }
}
