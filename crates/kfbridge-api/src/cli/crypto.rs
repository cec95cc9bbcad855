//! Callback crypto debug aids: sign, encrypt, decrypt.

use anyhow::Result;
use secrecy::ExposeSecret;

use kfbridge_infra::crypto::cipher::CipherCodec;
use kfbridge_infra::crypto::signature::signature;
use kfbridge_types::config::BridgeConfig;

pub fn sign(config: &BridgeConfig, timestamp: &str, nonce: &str, payload: &str, json: bool) -> Result<()> {
    let digest = signature(config.wechat.kf_token.expose_secret(), timestamp, nonce, payload);
    if json {
        println!("{}", serde_json::json!({ "msg_signature": digest }));
    } else {
        println!("{digest}");
    }
    Ok(())
}

fn codec(config: &BridgeConfig) -> Result<CipherCodec> {
    Ok(CipherCodec::new(config.wechat.encoding_aes_key.expose_secret())?)
}

pub fn encrypt(config: &BridgeConfig, text: &str, receive_id: Option<&str>, json: bool) -> Result<()> {
    let receive_id = receive_id.unwrap_or(&config.wechat.corp_id);
    let ciphertext = codec(config)?.encrypt(text, receive_id)?;
    if json {
        println!("{}", serde_json::json!({ "encrypt": ciphertext }));
    } else {
        println!("{ciphertext}");
    }
    Ok(())
}

pub fn decrypt(config: &BridgeConfig, ciphertext: &str, json: bool) -> Result<()> {
    let frame = codec(config)?.decrypt_frame(ciphertext)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "message": frame.message, "receive_id": frame.receive_id })
        );
    } else {
        println!("{}", frame.message);
    }
    Ok(())
}
