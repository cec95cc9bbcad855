//! WeComClient -- outbound chat API with a lazily refreshed access token.
//!
//! Implements [`MessageSender`] for customer-service replies and also sends
//! internal application messages (text / markdown).
//!
//! The access token is cached process-wide in a `RwLock<Option<_>>`. Refresh
//! happens on demand and the lock is never held across the remote call, so
//! concurrent refreshes may race; the last one stored wins.

use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use kfbridge_core::message::sender::MessageSender;
use kfbridge_types::config::WechatConfig;
use kfbridge_types::error::ChatApiError;
use kfbridge_types::wecom::{
    AccessCredential, AccessTokenResponse, AppMessage, KfSendRequest, SendResponse,
};

/// Timeout applied to every chat API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// errcodes meaning the cached token is no longer accepted.
const TOKEN_REJECTED_CODES: [i64; 3] = [40001, 40014, 42001];

pub struct WeComClient {
    client: reqwest::Client,
    base_url: String,
    corp_id: String,
    secret: SecretString,
    credential: RwLock<Option<AccessCredential>>,
}

impl WeComClient {
    pub fn new(
        base_url: impl Into<String>,
        corp_id: impl Into<String>,
        secret: SecretString,
    ) -> Result<Self, ChatApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            corp_id: corp_id.into(),
            secret,
            credential: RwLock::new(None),
        })
    }

    pub fn from_config(config: &WechatConfig) -> Result<Self, ChatApiError> {
        Self::new(
            config.api_base.clone(),
            config.corp_id.clone(),
            SecretString::from(config.kf_secret.expose_secret().to_string()),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Return a valid access token, fetching a new one if needed.
    pub async fn access_token(&self) -> Result<String, ChatApiError> {
        {
            let cached = self.credential.read().await;
            if let Some(credential) = cached.as_ref().filter(|c| c.is_valid(Utc::now())) {
                return Ok(credential.token.clone());
            }
        }

        let credential = self.fetch_token().await?;
        let token = credential.token.clone();
        *self.credential.write().await = Some(credential);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<AccessCredential, ChatApiError> {
        let response = self
            .client
            .get(self.url("/cgi-bin/gettoken"))
            .query(&[
                ("corpid", self.corp_id.as_str()),
                ("corpsecret", self.secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| ChatApiError::Network(e.to_string()))?;

        let body: AccessTokenResponse = read_json(response).await?;
        if body.errcode != 0 {
            tracing::error!(errcode = body.errcode, errmsg = %body.errmsg, "access token request rejected");
            return Err(ChatApiError::Api {
                errcode: body.errcode,
                errmsg: body.errmsg,
            });
        }

        tracing::debug!(expires_in = body.expires_in, "access token refreshed");
        Ok(AccessCredential::from_response(&body, Utc::now()))
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate_token(&self) {
        *self.credential.write().await = None;
    }

    async fn post_message<B: Serialize>(&self, path: &str, body: &B) -> Result<SendResponse, ChatApiError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(path))
            .query(&[("access_token", token.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| ChatApiError::Network(e.to_string()))?;

        let result: SendResponse = read_json(response).await?;
        if result.errcode != 0 {
            tracing::warn!(errcode = result.errcode, errmsg = %result.errmsg, path, "send rejected");
            if TOKEN_REJECTED_CODES.contains(&result.errcode) {
                self.invalidate_token().await;
            }
            return Err(ChatApiError::Api {
                errcode: result.errcode,
                errmsg: result.errmsg,
            });
        }
        Ok(result)
    }

    /// Reply to a customer-service user.
    pub async fn send_kf_message(
        &self,
        external_user_id: &str,
        text: &str,
    ) -> Result<SendResponse, ChatApiError> {
        let body = KfSendRequest {
            external_userid: external_user_id.to_string(),
            text: text.to_string(),
        };
        self.post_message("/cgi-bin/kf/send_msg", &body).await
    }

    /// Send an internal application message.
    pub async fn send_app_message(&self, message: &AppMessage) -> Result<SendResponse, ChatApiError> {
        self.post_message("/cgi-bin/message/send", message).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ChatApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatApiError::Http {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| ChatApiError::Deserialization(e.to_string()))
}

impl MessageSender for WeComClient {
    async fn send_text(&self, external_user_id: &str, content: &str) -> Result<(), ChatApiError> {
        self.send_kf_message(external_user_id, content).await?;
        Ok(())
    }
}
