//! Process configuration types for kfbridge.
//!
//! `BridgeConfig` is assembled by `kfbridge_infra::config::load_config` from
//! defaults, an optional `kfbridge.toml`, and environment variables. Secrets
//! are held as [`SecretString`] and never appear in `Debug` output.

use secrecy::{ExposeSecret, SecretString};

use crate::context::DEFAULT_CONTEXT_TTL_SECS;
use crate::error::ConfigError;

pub const DEFAULT_WECHAT_API_BASE: &str = "https://qyapi.weixin.qq.com";
pub const DEFAULT_COZE_API_BASE: &str = "https://api.coze.cn";
pub const DEFAULT_COZE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_CACHE_PREFIX: &str = "wechat:";
pub const DEFAULT_WELCOME_TEXT: &str =
    "欢迎使用智能客服服务！我可以帮助您解答问题，请随时与我对话。";
pub const DEFAULT_DEGRADED_TEXT: &str = "抱歉，服务暂时不可用，请稍后再试。";

/// Length of the platform's base64 `EncodingAESKey` (without the trailing `=`).
pub const ENCODING_AES_KEY_LEN: usize = 43;

/// Top-level configuration.
#[derive(Debug, Default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub wechat: WechatConfig,
    pub coze: CozeConfig,
    pub cache: CacheConfig,
    pub admin: AdminConfig,
    pub messages: MessagesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Chat platform credentials.
#[derive(Debug)]
pub struct WechatConfig {
    pub corp_id: String,
    pub kf_secret: SecretString,
    pub kf_token: SecretString,
    pub encoding_aes_key: SecretString,
    pub api_base: String,
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            corp_id: String::new(),
            kf_secret: SecretString::from(String::new()),
            kf_token: SecretString::from(String::new()),
            encoding_aes_key: SecretString::from(String::new()),
            api_base: DEFAULT_WECHAT_API_BASE.to_string(),
        }
    }
}

/// Workflow engine settings.
#[derive(Debug)]
pub struct CozeConfig {
    pub api_key: SecretString,
    pub api_base_url: String,
    pub workflow_id: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Use the streaming endpoint and concatenate chunks into the reply.
    pub stream: bool,
}

impl Default for CozeConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            api_base_url: DEFAULT_COZE_API_BASE.to_string(),
            workflow_id: String::new(),
            timeout_ms: DEFAULT_COZE_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            stream: false,
        }
    }
}

/// Which context cache implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(ConfigError::Invalid(format!("unknown cache backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub database_url: String,
    pub prefix: String,
    pub context_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            database_url: "sqlite://kfbridge.db?mode=rwc".to_string(),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            context_ttl_secs: DEFAULT_CONTEXT_TTL_SECS,
        }
    }
}

/// Admin routes are only mounted when a token is configured.
#[derive(Debug, Default)]
pub struct AdminConfig {
    pub token: Option<SecretString>,
}

/// User-visible texts sent by the dispatcher.
#[derive(Debug, Clone)]
pub struct MessagesConfig {
    pub welcome: String,
    pub degraded: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            welcome: DEFAULT_WELCOME_TEXT.to_string(),
            degraded: DEFAULT_DEGRADED_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub json: bool,
    pub otel: bool,
}

impl BridgeConfig {
    /// Check that everything needed to serve callbacks is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wechat.kf_token.expose_secret().is_empty() {
            return Err(ConfigError::Missing("WECHAT_KF_TOKEN".to_string()));
        }
        let key_len = self.wechat.encoding_aes_key.expose_secret().len();
        if key_len != ENCODING_AES_KEY_LEN {
            return Err(ConfigError::Invalid(format!(
                "WECHAT_KF_ENCODING_AES_KEY must be {ENCODING_AES_KEY_LEN} characters, got {key_len}"
            )));
        }
        if self.wechat.corp_id.is_empty() {
            return Err(ConfigError::Missing("WECHAT_CORP_ID".to_string()));
        }
        if self.coze.workflow_id.is_empty() {
            return Err(ConfigError::Missing("COZE_WORKFLOW_ID".to_string()));
        }
        if self.coze.api_key.expose_secret().is_empty() {
            return Err(ConfigError::Missing("COZE_API_KEY".to_string()));
        }
        Ok(())
    }
}
