//! Inbound callback shapes delivered by the chat platform.
//!
//! Every field is optional at the serde layer: a missing field must surface
//! as an authentication failure from the verifier, not as a JSON error.

use serde::{Deserialize, Deserializer, Serialize};

/// Encrypted callback body (`POST /webhook/wechat`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Encrypt", default)]
    pub encrypt: Option<String>,
    #[serde(rename = "MsgSignature", default)]
    pub msg_signature: Option<String>,
    #[serde(rename = "TimeStamp", default, deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    #[serde(rename = "Nonce", default, deserialize_with = "string_or_number")]
    pub nonce: Option<String>,
}

/// Some senders emit `TimeStamp`/`Nonce` as JSON numbers; both forms sign
/// the same way, so keep the decimal text.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

/// URL verification handshake (`GET /webhook/wechat` query string).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlChallenge {
    #[serde(default)]
    pub msg_signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub echostr: Option<String>,
}

/// Outbound encrypted + signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReply {
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
    #[serde(rename = "MsgSignature")]
    pub msg_signature: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "Nonce")]
    pub nonce: String,
}

impl From<EncryptedReply> for CallbackEnvelope {
    fn from(reply: EncryptedReply) -> Self {
        Self {
            encrypt: Some(reply.encrypt),
            msg_signature: Some(reply.msg_signature),
            timestamp: Some(reply.timestamp),
            nonce: Some(reply.nonce),
        }
    }
}

/// What the dispatcher did with one callback. Used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// A workflow reply was sent to the user.
    Replied { external_user_id: String, context_id: String },
    /// The workflow produced no output; nothing was sent.
    NoReply { external_user_id: String },
    /// The degraded-service notice was sent (or attempted).
    Degraded { external_user_id: String },
    /// The welcome text was sent after a subscribe event.
    Welcomed { external_user_id: String },
    /// A lifecycle or unsupported message was logged only.
    Ignored { reason: String },
    /// The message was dropped before processing.
    Dropped { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_missing_fields_deserialize() {
        let env: CallbackEnvelope = serde_json::from_str(r#"{"Encrypt":"abc"}"#).unwrap();
        assert_eq!(env.encrypt.as_deref(), Some("abc"));
        assert!(env.msg_signature.is_none());
        assert!(env.nonce.is_none());
    }

    #[test]
    fn test_envelope_platform_field_names() {
        let raw = r#"{"Encrypt":"e","MsgSignature":"s","TimeStamp":"1","Nonce":"n"}"#;
        let env: CallbackEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.timestamp.as_deref(), Some("1"));
        assert_eq!(env.msg_signature.as_deref(), Some("s"));
    }

    #[test]
    fn test_envelope_accepts_numeric_timestamp() {
        let raw = r#"{"Encrypt":"e","MsgSignature":"s","TimeStamp":1409659813,"Nonce":1372623149}"#;
        let env: CallbackEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.timestamp.as_deref(), Some("1409659813"));
        assert_eq!(env.nonce.as_deref(), Some("1372623149"));

        let env: CallbackEnvelope = serde_json::from_str(r#"{"TimeStamp":null}"#).unwrap();
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn test_reply_converts_to_envelope() {
        let reply = EncryptedReply {
            encrypt: "e".into(),
            msg_signature: "s".into(),
            timestamp: "1".into(),
            nonce: "n".into(),
        };
        let env = CallbackEnvelope::from(reply);
        assert_eq!(env.encrypt.as_deref(), Some("e"));
    }

    #[test]
    fn test_outcome_serialization_tag() {
        let outcome = CallbackOutcome::Dropped { reason: "no user id".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "dropped");
    }
}
