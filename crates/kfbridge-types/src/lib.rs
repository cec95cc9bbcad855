//! Shared domain types for kfbridge.
//!
//! Callback envelopes, decoded chat events, conversation contexts, workflow
//! API shapes, chat API shapes, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod callback;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod wecom;
pub mod workflow;
