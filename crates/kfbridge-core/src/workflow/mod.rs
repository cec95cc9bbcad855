//! Workflow engine integration: gateway ports, retry policy, reply extraction.

pub mod gateway;
pub mod reply;
pub mod retry;
