//! Decrypted chat-platform messages and their classification.

use serde::{Deserialize, Serialize};

use std::fmt;

/// `MsgType` value for plain text messages.
pub const MSG_TYPE_TEXT: &str = "text";
/// `MsgType` value for lifecycle / system events.
pub const MSG_TYPE_EVENT: &str = "event";
/// `Event` value announcing new customer-service messages to pull.
pub const EVENT_KF_MSG_OR_EVENT: &str = "kf_msg_or_event";

/// The decrypted `<xml>` document of a customer-service callback.
///
/// All fields default to empty so partially populated documents still parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KfMessageEvent {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: String,
    #[serde(rename = "MsgType", default)]
    pub msg_type: String,
    #[serde(rename = "Content", default)]
    pub content: Option<String>,
    #[serde(rename = "MsgId", default)]
    pub msg_id: Option<String>,
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
    #[serde(rename = "ExternalUserID", default)]
    pub external_user_id: Option<String>,
    #[serde(rename = "OpenKfId", default)]
    pub open_kf_id: Option<String>,
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
}

/// Lifecycle notification kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Subscribe,
    Unsubscribe,
    EnterSession,
    /// Any other event name, kept verbatim for logging.
    Other(String),
}

impl LifecycleKind {
    /// Map a raw `Event` field to a kind.
    pub fn from_event(event: &str) -> Self {
        match event {
            "subscribe" => LifecycleKind::Subscribe,
            "unsubscribe" => LifecycleKind::Unsubscribe,
            "enter_session" => LifecycleKind::EnterSession,
            other => LifecycleKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleKind::Subscribe => write!(f, "subscribe"),
            LifecycleKind::Unsubscribe => write!(f, "unsubscribe"),
            LifecycleKind::EnterSession => write!(f, "enter_session"),
            LifecycleKind::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A classified callback, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    TextMessage {
        external_user_id: String,
        content: String,
    },
    LifecycleEvent {
        external_user_id: String,
        kind: LifecycleKind,
    },
    Unsupported {
        raw_type: String,
    },
    /// Not an error: upstream must stop silently.
    Dropped {
        reason: String,
    },
}
