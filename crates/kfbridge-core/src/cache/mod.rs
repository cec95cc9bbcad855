//! Context cache port.
//!
//! A small string key/value store with per-key expiry. Implementations live
//! in kfbridge-infra (in-memory and SQLite).

pub mod box_cache;

use std::time::Duration;

use kfbridge_types::error::CacheError;

/// Expiring key/value store backing the [`ContextStore`](crate::context::store::ContextStore).
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait ContextCache: Send + Sync {
    /// Read a live value. Expired keys read as `None`.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, CacheError>> + Send;

    /// Write a value that expires after `ttl` (upsert).
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    /// Reset the expiry of a live key. Returns `false` if the key is absent.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool, CacheError>> + Send;

    /// Remove a key. Returns whether a live key was removed.
    fn del(&self, key: &str) -> impl std::future::Future<Output = Result<bool, CacheError>> + Send;

    /// List live keys starting with `prefix`.
    fn keys(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, CacheError>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    /// Release backend resources. Further calls may fail.
    fn close(&self) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;
}
