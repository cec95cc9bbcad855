//! Chat platform (WeCom customer service) adapters.
//!
//! - `verifier`: inbound callback verification and decryption
//! - `client`: outbound message API with a cached access token

pub mod client;
pub mod verifier;

pub use client::WeComClient;
pub use verifier::CallbackVerifier;
