//! Context cache backends and backend selection.

pub mod memory;

use kfbridge_core::cache::box_cache::BoxContextCache;
use kfbridge_types::config::{CacheBackend, CacheConfig};
use kfbridge_types::error::CacheError;

pub use memory::MemoryContextCache;

use crate::sqlite::context_cache::SqliteContextCache;

/// Open the backend named in configuration.
pub async fn open_cache(config: &CacheConfig) -> Result<BoxContextCache, CacheError> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::info!("using in-memory context cache");
            Ok(BoxContextCache::new(MemoryContextCache::new()))
        }
        CacheBackend::Sqlite => {
            tracing::info!(database_url = %config.database_url, "using sqlite context cache");
            let cache = SqliteContextCache::connect(&config.database_url).await?;
            Ok(BoxContextCache::new(cache))
        }
    }
}
