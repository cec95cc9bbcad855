//! Chat platform (WeCom) outbound API types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds shaved off a token's advertised lifetime before it is refreshed.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// Response of `GET /cgi-bin/gettoken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
}

/// Cached access token for the outbound send path.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    /// Build a credential from a token response fetched at `fetched_at`.
    ///
    /// The expiry is pulled forward by [`TOKEN_EXPIRY_MARGIN_SECS`].
    pub fn from_response(resp: &AccessTokenResponse, fetched_at: DateTime<Utc>) -> Self {
        Self {
            token: resp.access_token.clone(),
            expires_at: fetched_at + Duration::seconds(resp.expires_in - TOKEN_EXPIRY_MARGIN_SECS),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }
}

// The token is a bearer credential; keep it out of Debug output.
impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body of `POST /cgi-bin/kf/send_msg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KfSendRequest {
    pub external_userid: String,
    pub text: String,
}

/// Text or markdown body of an application message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    pub content: String,
}

/// Body of `POST /cgi-bin/message/send` (internal application message).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum AppMessage {
    Text { touser: String, text: MessageContent },
    Markdown { touser: String, markdown: MessageContent },
}

impl AppMessage {
    pub fn text(user: impl Into<String>, content: impl Into<String>) -> Self {
        AppMessage::Text {
            touser: user.into(),
            text: MessageContent { content: content.into() },
        }
    }

    pub fn markdown(user: impl Into<String>, content: impl Into<String>) -> Self {
        AppMessage::Markdown {
            touser: user.into(),
            markdown: MessageContent { content: content.into() },
        }
    }
}

/// Response of the send endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invaliduser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgid: Option<String>,
}
