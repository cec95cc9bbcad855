//! ContextStore: maps an external user id to a workflow conversation id.
//!
//! Records live in a [`ContextCache`] as camelCase JSON under
//! `{prefix}context:{externalUserId}` and expire after a fixed TTL that is
//! refreshed on every turn.
//!
//! There is no cross-request locking. Two concurrent first messages from the
//! same user may both create a remote conversation; the last write wins and
//! the losing conversation id is simply never used again.

use std::sync::Arc;
use std::time::Duration;

use kfbridge_types::context::{CONTEXT_KEY_PREFIX, ConversationContext, context_key};
use kfbridge_types::error::CacheError;

use crate::cache::ContextCache;
use crate::workflow::gateway::ConversationCreator;

pub struct ContextStore<C, R> {
    cache: Arc<C>,
    creator: Arc<R>,
    prefix: String,
    ttl: Duration,
}

impl<C, R> ContextStore<C, R>
where
    C: ContextCache,
    R: ConversationCreator,
{
    pub fn new(cache: Arc<C>, creator: Arc<R>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            creator,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, external_user_id: &str) -> String {
        context_key(&self.prefix, external_user_id)
    }

    /// Return the user's conversation id, creating one on first contact.
    ///
    /// An existing record has its counter bumped and its TTL refreshed.
    /// Returns `None` when the cache lookup or the remote creation fails;
    /// callers treat that as "context unavailable".
    #[tracing::instrument(skip(self), fields(context_id = tracing::field::Empty))]
    pub async fn get_or_create_context(&self, external_user_id: &str) -> Option<String> {
        let key = self.key(external_user_id);

        let cached = match self.cache.get(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::error!(error = %e, "context lookup failed");
                return None;
            }
        };

        if let Some(raw) = cached {
            match serde_json::from_str::<ConversationContext>(&raw) {
                Ok(mut context) => {
                    context.touch();
                    self.persist(&key, &context).await;
                    tracing::Span::current().record("context_id", context.context_id.as_str());
                    tracing::debug!(message_count = context.message_count, "reusing context");
                    return Some(context.context_id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "corrupt context record, replacing it");
                }
            }
        }

        let context_id = match self.creator.create_conversation().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "failed to create conversation");
                return None;
            }
        };

        let context = ConversationContext::new(&context_id, external_user_id);
        self.persist(&key, &context).await;
        tracing::Span::current().record("context_id", context_id.as_str());
        tracing::info!("created new context");
        Some(context_id)
    }

    // A failed write still leaves a usable id for this turn; the next turn
    // will simply create or refresh again.
    async fn persist(&self, key: &str, context: &ConversationContext) {
        let json = match serde_json::to_string(context) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize context");
                return;
            }
        };
        if let Err(e) = self.cache.set_ex(key, &json, self.ttl).await {
            tracing::warn!(error = %e, "failed to persist context");
        }
    }

    /// Read a user's record without touching it.
    pub async fn get_context_info(
        &self,
        external_user_id: &str,
    ) -> Result<Option<ConversationContext>, CacheError> {
        let Some(raw) = self.cache.get(&self.key(external_user_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Remove a user's record. Returns whether one existed.
    pub async fn delete_context(&self, external_user_id: &str) -> Result<bool, CacheError> {
        let deleted = self.cache.del(&self.key(external_user_id)).await?;
        tracing::info!(external_user_id, deleted, "context deleted");
        Ok(deleted)
    }

    /// Reset a record's TTL without counting a turn.
    pub async fn refresh_ttl(&self, external_user_id: &str) -> Result<bool, CacheError> {
        self.cache.expire(&self.key(external_user_id), self.ttl).await
    }

    /// All live records under this store's prefix. Corrupt entries are skipped.
    pub async fn list_active(&self) -> Result<Vec<ConversationContext>, CacheError> {
        let prefix = format!("{}{}", self.prefix, CONTEXT_KEY_PREFIX);
        let keys = self.cache.keys(&prefix).await?;

        let mut contexts = Vec::with_capacity(keys.len());
        for key in keys {
            // Keys can expire between listing and reading.
            let Some(raw) = self.cache.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<ConversationContext>(&raw) {
                Ok(context) => contexts.push(context),
                Err(e) => tracing::warn!(%key, error = %e, "skipping corrupt context record"),
            }
        }
        contexts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(contexts)
    }
}
