//! BoxContextCache -- object-safe dynamic dispatch wrapper for ContextCache.
//!
//! 1. `ContextCacheDyn` is an object-safe mirror of `ContextCache` with boxed futures
//! 2. Blanket-impl `ContextCacheDyn` for all `T: ContextCache`
//! 3. `BoxContextCache` wraps `Box<dyn ContextCacheDyn>` and implements `ContextCache` again
//!
//! This lets the binary pick the backend from configuration at runtime while
//! the core stays generic.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use kfbridge_types::error::CacheError;

use super::ContextCache;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Object-safe version of [`ContextCache`].
pub trait ContextCacheDyn: Send + Sync {
    fn get_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;
    fn set_ex_boxed<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> BoxFuture<'a, ()>;
    fn expire_boxed<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, bool>;
    fn del_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, bool>;
    fn keys_boxed<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Vec<String>>;
    fn ping_boxed(&self) -> BoxFuture<'_, ()>;
    fn close_boxed(&self) -> BoxFuture<'_, ()>;
}

impl<T: ContextCache> ContextCacheDyn for T {
    fn get_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(self.get(key))
    }

    fn set_ex_boxed<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> BoxFuture<'a, ()> {
        Box::pin(self.set_ex(key, value, ttl))
    }

    fn expire_boxed<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, bool> {
        Box::pin(self.expire(key, ttl))
    }

    fn del_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(self.del(key))
    }

    fn keys_boxed<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Vec<String>> {
        Box::pin(self.keys(prefix))
    }

    fn ping_boxed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.ping())
    }

    fn close_boxed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.close())
    }
}

/// Type-erased context cache for runtime backend selection.
pub struct BoxContextCache {
    inner: Box<dyn ContextCacheDyn>,
}

impl BoxContextCache {
    pub fn new<T: ContextCache + 'static>(cache: T) -> Self {
        Self {
            inner: Box::new(cache),
        }
    }
}

impl ContextCache for BoxContextCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get_boxed(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set_ex_boxed(key, value, ttl).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.inner.expire_boxed(key, ttl).await
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.inner.del_boxed(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.inner.keys_boxed(prefix).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.inner.ping_boxed().await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.inner.close_boxed().await
    }
}
