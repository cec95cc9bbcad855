//! Hand-written port mocks shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use kfbridge_types::callback::{CallbackEnvelope, UrlChallenge};
use kfbridge_types::error::{CacheError, CallbackError, ChatApiError, WorkflowError};
use kfbridge_types::workflow::WorkflowResult;

use crate::cache::ContextCache;
use crate::callback::CallbackDecryptor;
use crate::message::sender::MessageSender;
use crate::workflow::gateway::{ConversationCreator, WorkflowGateway, WorkflowStream};

// ---------------------------------------------------------------------------
// MockCache
// ---------------------------------------------------------------------------

/// In-memory cache that records TTLs but never expires anything.
#[derive(Default)]
pub struct MockCache {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    fail_reads: AtomicBool,
}

impl MockCache {
    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Duration::ZERO));
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }
}

impl ContextCache for MockCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("unreachable".into()));
        }
        Ok(self.get_raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.1 = ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockCreator
// ---------------------------------------------------------------------------

/// Returns queued results in order, then fails.
pub struct MockCreator {
    results: Mutex<VecDeque<Result<String, WorkflowError>>>,
    calls: AtomicU32,
}

impl MockCreator {
    pub fn new(results: Vec<Result<String, WorkflowError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConversationCreator for MockCreator {
    async fn create_conversation(&self) -> Result<String, WorkflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WorkflowError::Api {
                code: 4000,
                msg: "no conversation".into(),
            }))
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// Creates one fixed conversation id and answers every execution the same way.
pub struct MockGateway {
    conversation_id: String,
    result: Result<WorkflowResult, WorkflowError>,
    chunks: Vec<String>,
    fail_creation: bool,
    created: AtomicU32,
    invocations: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    pub fn new(conversation_id: &str, result: Result<WorkflowResult, WorkflowError>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            result,
            chunks: Vec::new(),
            fail_creation: false,
            created: AtomicU32::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_creation(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.chunks = chunks.into_iter().map(String::from).collect();
        self
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<(String, String)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl ConversationCreator for MockGateway {
    async fn create_conversation(&self) -> Result<String, WorkflowError> {
        if self.fail_creation {
            return Err(WorkflowError::Network {
                message: "connection refused".into(),
                timeout: false,
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.conversation_id.clone())
    }
}

impl WorkflowGateway for MockGateway {
    async fn execute_workflow(
        &self,
        input: &str,
        context_id: &str,
    ) -> Result<WorkflowResult, WorkflowError> {
        self.invocations
            .lock()
            .unwrap()
            .push((input.to_string(), context_id.to_string()));
        self.result.clone()
    }

    fn execute_workflow_stream(&self, input: &str, context_id: &str) -> WorkflowStream {
        self.invocations
            .lock()
            .unwrap()
            .push((input.to_string(), context_id.to_string()));
        let chunks = self.chunks.clone();
        Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MockSender / MockDecryptor
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<(String, String)>>,
    fail_next: AtomicBool,
}

impl MockSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_first(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl MessageSender for MockSender {
    async fn send_text(&self, external_user_id: &str, content: &str) -> Result<(), ChatApiError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChatApiError::Api {
                errcode: 95001,
                errmsg: "send failed".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((external_user_id.to_string(), content.to_string()));
        Ok(())
    }
}

/// Accepts every envelope and yields a fixed plaintext, or rejects them all.
pub struct MockDecryptor {
    plaintext: Option<String>,
}

impl MockDecryptor {
    pub fn plaintext(xml: impl Into<String>) -> Self {
        Self {
            plaintext: Some(xml.into()),
        }
    }

    pub fn rejecting() -> Self {
        Self { plaintext: None }
    }
}

impl CallbackDecryptor for MockDecryptor {
    fn verify_and_decrypt(&self, _envelope: &CallbackEnvelope) -> Result<String, CallbackError> {
        self.plaintext
            .clone()
            .ok_or_else(|| CallbackError::Auth("signature mismatch".into()))
    }

    fn verify_url_challenge(&self, challenge: &UrlChallenge) -> Option<String> {
        self.plaintext.as_ref().and(challenge.echostr.clone())
    }
}
