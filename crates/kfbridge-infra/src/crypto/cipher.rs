//! AES-256-CBC payload framing for encrypted callbacks.
//!
//! Key: base64-decode(`EncodingAESKey + "="`), exactly 32 bytes.
//! IV: the first 16 key bytes.
//!
//! Plaintext frame before padding:
//! `random (16 bytes) || len (u32 BE) || payload (len bytes) || receive id`
//!
//! Padding is PKCS#7 over a 32-byte block, as the platform produces it.
//! Decryption accepts any pad length from 1 to 32.
//!
//! SECURITY: Error values never contain plaintext or key material.

use aes::Aes256;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;

use kfbridge_types::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;
const RANDOM_PREFIX: usize = 16;
const LENGTH_FIELD: usize = 4;
const FRAME_HEADER: usize = RANDOM_PREFIX + LENGTH_FIELD;
const PAD_BLOCK: usize = 32;
const AES_BLOCK: usize = 16;

/// Encoding keys are generated by the platform and are not always canonical
/// base64 (the last character may carry non-zero trailing bits).
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A decrypted frame: the payload and the trailing receive id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFrame {
    pub message: String,
    pub receive_id: String,
}

/// Symmetric codec bound to one encoding key.
///
/// The key is validated once at construction.
#[derive(Clone)]
pub struct CipherCodec {
    key: [u8; KEY_SIZE],
}

// Never print key bytes.
impl std::fmt::Debug for CipherCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherCodec").finish_non_exhaustive()
    }
}

impl CipherCodec {
    /// Build a codec from the 43-character base64 `EncodingAESKey`.
    pub fn new(encoding_key: &str) -> Result<Self, CryptoError> {
        let decoded = LENIENT_BASE64
            .decode(format!("{}=", encoding_key.trim()))
            .map_err(|_| CryptoError::InvalidKey("not valid base64".to_string()))?;
        let key: [u8; KEY_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", decoded.len()))
        })?;
        Ok(Self { key })
    }

    fn iv(&self) -> &[u8] {
        &self.key[..IV_SIZE]
    }

    /// Decrypt a base64 ciphertext and return only the payload.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, CryptoError> {
        self.decrypt_frame(ciphertext_b64).map(|frame| frame.message)
    }

    /// Decrypt a base64 ciphertext and return the payload and receive id.
    pub fn decrypt_frame(&self, ciphertext_b64: &str) -> Result<DecryptedFrame, CryptoError> {
        let data = STANDARD
            .decode(ciphertext_b64.trim())
            .map_err(|_| CryptoError::InvalidBase64)?;
        if data.is_empty() || data.len() % AES_BLOCK != 0 {
            return Err(CryptoError::Cipher(format!(
                "ciphertext length {} is not a multiple of {AES_BLOCK}",
                data.len()
            )));
        }

        let decryptor = Aes256CbcDec::new_from_slices(&self.key, self.iv())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;
        let padded = decryptor
            .decrypt_padded_vec_mut::<NoPadding>(&data)
            .map_err(|_| CryptoError::Cipher("decryption failed".to_string()))?;
        let plain = strip_padding(&padded)?;

        if plain.len() < FRAME_HEADER {
            return Err(CryptoError::FrameTooShort { len: plain.len() });
        }
        let mut length_bytes = [0u8; LENGTH_FIELD];
        length_bytes.copy_from_slice(&plain[RANDOM_PREFIX..FRAME_HEADER]);
        let declared = u32::from_be_bytes(length_bytes) as usize;
        let available = plain.len() - FRAME_HEADER;
        if declared > available {
            return Err(CryptoError::LengthOutOfBounds {
                declared,
                available,
            });
        }

        let (message, receive_id) = plain[FRAME_HEADER..].split_at(declared);
        Ok(DecryptedFrame {
            message: String::from_utf8(message.to_vec()).map_err(|_| CryptoError::InvalidUtf8)?,
            receive_id: String::from_utf8(receive_id.to_vec())
                .map_err(|_| CryptoError::InvalidUtf8)?,
        })
    }

    /// Encrypt `text` for `receive_id` with a fresh random prefix.
    ///
    /// Encrypting the same text twice yields different ciphertexts.
    pub fn encrypt(&self, text: &str, receive_id: &str) -> Result<String, CryptoError> {
        let length = u32::try_from(text.len())
            .map_err(|_| CryptoError::Cipher("payload too large".to_string()))?;

        let mut random = [0u8; RANDOM_PREFIX];
        OsRng.fill_bytes(&mut random);

        let mut frame = Vec::with_capacity(FRAME_HEADER + text.len() + receive_id.len() + PAD_BLOCK);
        frame.extend_from_slice(&random);
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(text.as_bytes());
        frame.extend_from_slice(receive_id.as_bytes());
        add_padding(&mut frame);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.key, self.iv())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<NoPadding>(&frame);
        Ok(STANDARD.encode(ciphertext))
    }
}

// ---------------------------------------------------------------------------
// PKCS#7 over a 32-byte block
// ---------------------------------------------------------------------------

fn add_padding(frame: &mut Vec<u8>) {
    let pad = PAD_BLOCK - (frame.len() % PAD_BLOCK);
    frame.extend(std::iter::repeat_n(pad as u8, pad));
}

fn strip_padding(data: &[u8]) -> Result<&[u8], CryptoError> {
    let pad = *data.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad == 0 || pad > PAD_BLOCK || pad > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    let (body, padding) = data.split_at(data.len() - pad);
    if padding.iter().any(|&b| b as usize != pad) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

    fn codec() -> CipherCodec {
        CipherCodec::new(KEY).unwrap()
    }

    fn raw_encrypt(codec: &CipherCodec, mut frame: Vec<u8>) -> String {
        add_padding(&mut frame);
        let enc = Aes256CbcEnc::new_from_slices(&codec.key, codec.iv()).unwrap();
        STANDARD.encode(enc.encrypt_padded_vec_mut::<NoPadding>(&frame))
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        let long = "x".repeat(1000);
        for text in ["", "hello", "<xml><Content><![CDATA[你好]]></Content></xml>", long.as_str()] {
            let ciphertext = codec.encrypt(text, "ww_corp").unwrap();
            let frame = codec.decrypt_frame(&ciphertext).unwrap();
            assert_eq!(frame.message, text);
            assert_eq!(frame.receive_id, "ww_corp");
        }
    }

    #[test]
    fn test_encrypt_is_randomized() {
        let codec = codec();
        let a = codec.encrypt("same", "id").unwrap();
        let b = codec.encrypt("same", "id").unwrap();
        assert_ne!(a, b);
        assert_eq!(codec.decrypt(&a).unwrap(), codec.decrypt(&b).unwrap());
    }

    #[test]
    fn test_ciphertext_is_block_aligned_to_32() {
        let raw = STANDARD.decode(codec().encrypt("hi", "id").unwrap()).unwrap();
        assert_eq!(raw.len() % PAD_BLOCK, 0);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(CipherCodec::new("short"), Err(CryptoError::InvalidKey(_))));
        assert!(matches!(CipherCodec::new(&"!".repeat(43)), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert_eq!(codec().decrypt("%%%not base64%%%"), Err(CryptoError::InvalidBase64));
    }

    #[test]
    fn test_rejects_partial_block() {
        let err = codec().decrypt(&STANDARD.encode([0u8; 20])).unwrap_err();
        assert!(matches!(err, CryptoError::Cipher(_)));
    }

    #[test]
    fn test_tampered_ciphertext_never_decodes_to_original() {
        let codec = codec();
        let ciphertext = codec.encrypt("transfer 100", "ww_corp").unwrap();
        let mut raw = STANDARD.decode(&ciphertext).unwrap();
        for index in [0, 5, 17, raw.len() - 1] {
            let original = raw[index];
            raw[index] ^= 0x01;
            let tampered = STANDARD.encode(&raw);
            if let Ok(plain) = codec.decrypt(&tampered) {
                assert_ne!(plain, "transfer 100");
            }
            raw[index] = original;
        }
    }

    #[test]
    fn test_wrong_key_fails_or_differs() {
        let ciphertext = codec().encrypt("secret", "id").unwrap();
        let other = CipherCodec::new("ZYXWVUTSRQPONMLKJIHGFEDCBA9876543210zyxwvut").unwrap();
        if let Ok(plain) = other.decrypt(&ciphertext) {
            assert_ne!(plain, "secret");
        }
    }

    #[test]
    fn test_out_of_bounds_length_is_rejected() {
        let codec = codec();
        let mut frame = vec![7u8; RANDOM_PREFIX];
        frame.extend_from_slice(&900u32.to_be_bytes());
        frame.extend_from_slice(b"tiny");
        let err = codec.decrypt(&raw_encrypt(&codec, frame)).unwrap_err();
        assert_eq!(
            err,
            CryptoError::LengthOutOfBounds {
                declared: 900,
                available: 4
            }
        );
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let codec = codec();
        let err = codec.decrypt(&raw_encrypt(&codec, vec![1u8; 10])).unwrap_err();
        assert_eq!(err, CryptoError::FrameTooShort { len: 10 });
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let codec = codec();
        let mut frame = vec![0u8; RANDOM_PREFIX];
        frame.extend_from_slice(&2u32.to_be_bytes());
        frame.extend_from_slice(&[0xff, 0xfe]);
        let err = codec.decrypt(&raw_encrypt(&codec, frame)).unwrap_err();
        assert_eq!(err, CryptoError::InvalidUtf8);
    }

    #[test]
    fn test_strip_padding_rules() {
        assert_eq!(strip_padding(&[1, 2, 3, 2, 2]).unwrap(), &[1, 2, 3]);
        assert_eq!(strip_padding(&[1, 0]), Err(CryptoError::InvalidPadding));
        assert_eq!(strip_padding(&[1, 3, 2]), Err(CryptoError::InvalidPadding));
        assert_eq!(strip_padding(&[33u8; 40]), Err(CryptoError::InvalidPadding));
        assert_eq!(strip_padding(&[]), Err(CryptoError::InvalidPadding));
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", codec());
        assert!(!debug.contains("key"));
    }
}
