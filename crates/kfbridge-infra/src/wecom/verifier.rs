//! CallbackVerifier: signature check + decryption of inbound callbacks.
//!
//! Implements the `CallbackDecryptor` port from kfbridge-core.

use secrecy::{ExposeSecret, SecretString};

use kfbridge_core::callback::CallbackDecryptor;
use kfbridge_types::callback::{CallbackEnvelope, EncryptedReply, UrlChallenge};
use kfbridge_types::config::WechatConfig;
use kfbridge_types::error::{CallbackError, CryptoError};

use crate::crypto::cipher::CipherCodec;
use crate::crypto::signature::{signature, verify_signature};

pub struct CallbackVerifier {
    token: SecretString,
    codec: CipherCodec,
    /// Expected trailing id of every frame (the corp id). Empty disables the check.
    receive_id: String,
}

impl CallbackVerifier {
    pub fn new(
        token: SecretString,
        encoding_key: &str,
        receive_id: impl Into<String>,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            token,
            codec: CipherCodec::new(encoding_key)?,
            receive_id: receive_id.into(),
        })
    }

    pub fn from_config(config: &WechatConfig) -> Result<Self, CryptoError> {
        Self::new(
            SecretString::from(config.kf_token.expose_secret().to_string()),
            config.encoding_aes_key.expose_secret(),
            config.corp_id.clone(),
        )
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    fn signature_matches(&self, timestamp: &str, nonce: &str, payload: &str, expected: &str) -> bool {
        verify_signature(self.token.expose_secret(), timestamp, nonce, payload, expected)
    }

    fn open(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let frame = self.codec.decrypt_frame(ciphertext)?;
        if !self.receive_id.is_empty() && frame.receive_id != self.receive_id {
            return Err(CryptoError::Cipher("receive id mismatch".to_string()));
        }
        Ok(frame.message)
    }

    /// Encrypt and sign an outbound payload.
    pub fn encrypt_reply(
        &self,
        plaintext: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<EncryptedReply, CryptoError> {
        let encrypt = self.codec.encrypt(plaintext, &self.receive_id)?;
        let msg_signature = signature(self.token.expose_secret(), timestamp, nonce, &encrypt);
        Ok(EncryptedReply {
            encrypt,
            msg_signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, CallbackError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CallbackError::Auth(format!("missing {name}"))),
    }
}

impl CallbackDecryptor for CallbackVerifier {
    fn verify_and_decrypt(&self, envelope: &CallbackEnvelope) -> Result<String, CallbackError> {
        let encrypt = required(&envelope.encrypt, "Encrypt")?;
        let msg_signature = required(&envelope.msg_signature, "MsgSignature")?;
        let timestamp = required(&envelope.timestamp, "TimeStamp")?;
        let nonce = required(&envelope.nonce, "Nonce")?;

        if !self.signature_matches(timestamp, nonce, encrypt, msg_signature) {
            tracing::warn!(timestamp, "callback signature mismatch");
            return Err(CallbackError::Auth("signature mismatch".to_string()));
        }

        Ok(self.open(encrypt)?)
    }

    fn verify_url_challenge(&self, challenge: &UrlChallenge) -> Option<String> {
        let fields = (
            challenge.msg_signature.as_deref().filter(|v| !v.is_empty()),
            challenge.timestamp.as_deref().filter(|v| !v.is_empty()),
            challenge.nonce.as_deref().filter(|v| !v.is_empty()),
            challenge.echostr.as_deref().filter(|v| !v.is_empty()),
        );
        let (Some(msg_signature), Some(timestamp), Some(nonce), Some(echostr)) = fields else {
            tracing::warn!("URL verification with missing parameters");
            return None;
        };

        if !self.signature_matches(timestamp, nonce, echostr, msg_signature) {
            tracing::warn!("URL verification signature mismatch");
            return None;
        }

        match self.open(echostr) {
            Ok(echo) => Some(echo),
            Err(e) => {
                tracing::warn!(error = %e, "URL verification echo could not be decrypted");
                None
            }
        }
    }
}
