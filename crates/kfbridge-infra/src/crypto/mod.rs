//! Callback cryptography.
//!
//! - `signature`: SHA-1 message signatures over sorted inputs
//! - `cipher`: AES-256-CBC framing of callback payloads

pub mod cipher;
pub mod signature;
