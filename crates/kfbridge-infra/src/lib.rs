//! Infrastructure layer for kfbridge.
//!
//! Implements the ports defined in `kfbridge-core`: callback signature and
//! AES-CBC framing, the WeCom and Coze HTTP clients, the in-memory and SQLite
//! context caches, and the layered configuration loader.

pub mod cache;
pub mod config;
pub mod coze;
pub mod crypto;
pub mod sqlite;
pub mod wecom;
