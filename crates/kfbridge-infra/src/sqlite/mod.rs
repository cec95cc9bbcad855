//! SQLite storage layer.
//!
//! The persistent context cache, backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod context_cache;
pub mod pool;
