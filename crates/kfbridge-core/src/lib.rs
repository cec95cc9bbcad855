//! Ports and callback-processing logic for kfbridge.
//!
//! This crate defines the ports (cache, workflow gateway, message sender,
//! callback decryptor) that the infrastructure layer implements, plus the
//! logic built on them. It depends only on `kfbridge-types`, never on
//! `kfbridge-infra` or any HTTP/database crate.

pub mod cache;
pub mod callback;
pub mod context;
pub mod dispatch;
pub mod message;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
