//! Callback verification port.
//!
//! Implemented by `kfbridge_infra::wecom::CallbackVerifier`. Verification is
//! pure CPU work, so the methods are synchronous.

use kfbridge_types::callback::{CallbackEnvelope, UrlChallenge};
use kfbridge_types::error::CallbackError;

pub trait CallbackDecryptor: Send + Sync {
    /// Check the envelope signature and return the decrypted body.
    ///
    /// `Auth` for missing fields or a signature mismatch, `Decode` when the
    /// ciphertext cannot be opened.
    fn verify_and_decrypt(&self, envelope: &CallbackEnvelope) -> Result<String, CallbackError>;

    /// Answer the URL verification handshake. `None` means "reject".
    fn verify_url_challenge(&self, challenge: &UrlChallenge) -> Option<String>;
}
