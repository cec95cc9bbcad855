//! Per-user conversation context lifecycle.

pub mod store;
