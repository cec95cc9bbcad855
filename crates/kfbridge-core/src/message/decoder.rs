//! MessageDecoder: parses decrypted callback XML and classifies it.
//!
//! Stateless; all logic lives in associated functions.

use kfbridge_types::error::CallbackError;
use kfbridge_types::message::{
    DecodedEvent, EVENT_KF_MSG_OR_EVENT, KfMessageEvent, LifecycleKind, MSG_TYPE_EVENT,
    MSG_TYPE_TEXT,
};

/// Maximum characters of user content written to logs.
pub const LOG_PREVIEW_CHARS: usize = 50;

pub struct MessageDecoder;

impl MessageDecoder {
    /// Parse an `<xml>` document. CDATA and plain text children are both
    /// accepted; unknown elements are ignored.
    pub fn parse(xml: &str) -> Result<KfMessageEvent, CallbackError> {
        let trimmed = xml.trim();
        if !trimmed.starts_with('<') {
            return Err(CallbackError::Parse("payload is not an XML document".to_string()));
        }
        quick_xml::de::from_str(trimmed).map_err(|e| CallbackError::Parse(e.to_string()))
    }

    /// The sender's id: `FromUserName`, else `ExternalUserID`, else "".
    pub fn extract_user_id(event: &KfMessageEvent) -> &str {
        if !event.from_user_name.is_empty() {
            return &event.from_user_name;
        }
        event.external_user_id.as_deref().unwrap_or("")
    }

    /// A "new customer-service messages are waiting" notification.
    pub fn is_kf_sync_event(event: &KfMessageEvent) -> bool {
        event.msg_type == MSG_TYPE_EVENT && event.event.as_deref() == Some(EVENT_KF_MSG_OR_EVENT)
    }

    pub fn classify(event: &KfMessageEvent) -> DecodedEvent {
        let user_id = Self::extract_user_id(event);
        if user_id.is_empty() {
            tracing::warn!(msg_type = %event.msg_type, "message without a user id");
            return DecodedEvent::Dropped {
                reason: "missing user id".to_string(),
            };
        }

        match event.msg_type.as_str() {
            MSG_TYPE_TEXT => {
                let content = event.content.as_deref().unwrap_or("");
                if content.trim().is_empty() {
                    tracing::warn!(external_user_id = user_id, "empty text message");
                    return DecodedEvent::Dropped {
                        reason: "empty text content".to_string(),
                    };
                }
                DecodedEvent::TextMessage {
                    external_user_id: user_id.to_string(),
                    content: content.to_string(),
                }
            }
            MSG_TYPE_EVENT => DecodedEvent::LifecycleEvent {
                external_user_id: user_id.to_string(),
                kind: LifecycleKind::from_event(event.event.as_deref().unwrap_or("")),
            },
            other => DecodedEvent::Unsupported {
                raw_type: other.to_string(),
            },
        }
    }
}

/// Shorten user content for log lines, on a character boundary.
pub fn log_preview(content: &str) -> String {
    let mut chars = content.chars();
    let preview: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}
