//! Conversation context types for kfbridge.
//!
//! A `ConversationContext` correlates one chat-platform user with one
//! conversation handle on the workflow engine. Records are stored as JSON
//! in the context cache under `context:<externalUserId>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default lifetime of a cached context record (24 hours).
pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 24 * 60 * 60;

/// Key prefix for context records, before the optional global prefix.
pub const CONTEXT_KEY_PREFIX: &str = "context:";

/// Per-user conversation handle.
///
/// Serialized with camelCase field names and epoch-millisecond timestamps so
/// records stay readable by other tools sharing the same cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Opaque conversation id assigned by the workflow engine.
    pub context_id: String,
    /// Remote identity of the chat user.
    pub external_user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Number of turns seen after the one that created the record.
    pub message_count: u64,
}

impl ConversationContext {
    /// Create a fresh record for a newly created remote conversation.
    pub fn new(context_id: impl Into<String>, external_user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            context_id: context_id.into(),
            external_user_id: external_user_id.into(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        }
    }

    /// Record another turn on this context.
    ///
    /// `context_id` is never touched; `message_count` only grows.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.message_count = self.message_count.saturating_add(1);
    }
}

/// Build the cache key for a user: `{prefix}context:{external_user_id}`.
pub fn context_key(prefix: &str, external_user_id: &str) -> String {
    format!("{prefix}{CONTEXT_KEY_PREFIX}{external_user_id}")
}
