//! Workflow engine (Coze) HTTP client.

pub mod client;
pub mod streaming;

pub use client::CozeWorkflowClient;
