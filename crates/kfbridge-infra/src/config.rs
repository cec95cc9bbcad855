//! Configuration loader for kfbridge.
//!
//! Layers, lowest to highest priority:
//! 1. [`BridgeConfig::default()`]
//! 2. `kfbridge.toml` (path from `--config`, else `KFBRIDGE_CONFIG`, else the
//!    working directory). A missing file is fine; a malformed one is an error.
//! 3. Environment variables (`PORT`, `WECHAT_KF_TOKEN`, `COZE_API_KEY`, ...).
//!
//! `.env` loading (dotenvy) is left to the binary so tests stay hermetic.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;
use serde::Deserialize;

use kfbridge_types::config::{BridgeConfig, CacheBackend};
use kfbridge_types::error::ConfigError;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kfbridge.toml";

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

// Every field is optional so a file only needs the settings it overrides.

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    server: ServerSection,
    wechat: WechatSection,
    coze: CozeSection,
    cache: CacheSection,
    admin: AdminSection,
    messages: MessagesSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WechatSection {
    corp_id: Option<String>,
    kf_secret: Option<String>,
    kf_token: Option<String>,
    encoding_aes_key: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CozeSection {
    api_key: Option<String>,
    api_base_url: Option<String>,
    workflow_id: Option<String>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    stream: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CacheSection {
    backend: Option<String>,
    database_url: Option<String>,
    prefix: Option<String>,
    context_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AdminSection {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MessagesSection {
    welcome: Option<String>,
    degraded: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingSection {
    json: Option<bool>,
    otel: Option<bool>,
}

fn secret(value: String) -> SecretString {
    SecretString::from(value)
}

fn apply_file(config: &mut BridgeConfig, file: ConfigFile) -> Result<(), ConfigError> {
    let ConfigFile {
        server,
        wechat,
        coze,
        cache,
        admin,
        messages,
        logging,
    } = file;

    if let Some(v) = server.host { config.server.host = v; }
    if let Some(v) = server.port { config.server.port = v; }

    if let Some(v) = wechat.corp_id { config.wechat.corp_id = v; }
    if let Some(v) = wechat.kf_secret { config.wechat.kf_secret = secret(v); }
    if let Some(v) = wechat.kf_token { config.wechat.kf_token = secret(v); }
    if let Some(v) = wechat.encoding_aes_key { config.wechat.encoding_aes_key = secret(v); }
    if let Some(v) = wechat.api_base { config.wechat.api_base = v; }

    if let Some(v) = coze.api_key { config.coze.api_key = secret(v); }
    if let Some(v) = coze.api_base_url { config.coze.api_base_url = v; }
    if let Some(v) = coze.workflow_id { config.coze.workflow_id = v; }
    if let Some(v) = coze.timeout_ms { config.coze.timeout_ms = v; }
    if let Some(v) = coze.max_retries { config.coze.max_retries = v; }
    if let Some(v) = coze.retry_delay_ms { config.coze.retry_delay_ms = v; }
    if let Some(v) = coze.stream { config.coze.stream = v; }

    if let Some(v) = cache.backend { config.cache.backend = v.parse()?; }
    if let Some(v) = cache.database_url { config.cache.database_url = v; }
    if let Some(v) = cache.prefix { config.cache.prefix = v; }
    if let Some(v) = cache.context_ttl_secs { config.cache.context_ttl_secs = v; }

    if let Some(v) = admin.token.filter(|t| !t.is_empty()) { config.admin.token = Some(secret(v)); }

    if let Some(v) = messages.welcome { config.messages.welcome = v; }
    if let Some(v) = messages.degraded { config.messages.degraded = v; }

    if let Some(v) = logging.json { config.logging.json = v; }
    if let Some(v) = logging.otel { config.logging.otel = v; }

    Ok(())
}

// ---------------------------------------------------------------------------
// Environment layer
// ---------------------------------------------------------------------------

fn parse_env<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{name}: expected a boolean, got '{other}'"))),
    }
}

fn apply_env<F>(config: &mut BridgeConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env("HOST") { config.server.host = v; }
    if let Some(v) = env("PORT") { config.server.port = parse_env("PORT", &v)?; }

    if let Some(v) = env("WECHAT_CORP_ID") { config.wechat.corp_id = v; }
    if let Some(v) = env("WECHAT_KF_SECRET") { config.wechat.kf_secret = secret(v); }
    if let Some(v) = env("WECHAT_KF_TOKEN") { config.wechat.kf_token = secret(v); }
    if let Some(v) = env("WECHAT_KF_ENCODING_AES_KEY") { config.wechat.encoding_aes_key = secret(v); }
    if let Some(v) = env("WECHAT_API_BASE") { config.wechat.api_base = v; }

    if let Some(v) = env("COZE_API_KEY") { config.coze.api_key = secret(v); }
    if let Some(v) = env("COZE_API_BASE_URL") { config.coze.api_base_url = v; }
    if let Some(v) = env("COZE_WORKFLOW_ID") { config.coze.workflow_id = v; }
    if let Some(v) = env("COZE_TIMEOUT") { config.coze.timeout_ms = parse_env("COZE_TIMEOUT", &v)?; }
    if let Some(v) = env("COZE_MAX_RETRIES") { config.coze.max_retries = parse_env("COZE_MAX_RETRIES", &v)?; }
    if let Some(v) = env("COZE_RETRY_DELAY") { config.coze.retry_delay_ms = parse_env("COZE_RETRY_DELAY", &v)?; }
    if let Some(v) = env("COZE_STREAM") { config.coze.stream = parse_bool("COZE_STREAM", &v)?; }

    if let Some(v) = env("CACHE_BACKEND") { config.cache.backend = v.parse::<CacheBackend>()?; }
    if let Some(v) = env("CACHE_DATABASE_URL") { config.cache.database_url = v; }
    if let Some(v) = env("CACHE_PREFIX").or_else(|| env("REDIS_PREFIX")) { config.cache.prefix = v; }
    if let Some(v) = env("CONTEXT_TTL") { config.cache.context_ttl_secs = parse_env("CONTEXT_TTL", &v)?; }

    if let Some(v) = env("ADMIN_TOKEN").filter(|t| !t.is_empty()) { config.admin.token = Some(secret(v)); }

    Ok(())
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Resolve which file to read: explicit path, `KFBRIDGE_CONFIG`, or the default.
fn resolve_path<F>(path: Option<&Path>, env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    path.map(Path::to_path_buf)
        .or_else(|| env("KFBRIDGE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load configuration from defaults, the config file, and the process environment.
pub async fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok()).await
}

/// Same as [`load_config`] with an injectable environment lookup.
pub async fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<BridgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BridgeConfig::default();
    let config_path = resolve_path(path, &env);

    match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => {
            let file: ConfigFile = toml::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("{}: {e}", config_path.display())))?;
            apply_file(&mut config, file)?;
            tracing::debug!("loaded config from {}", config_path.display());
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config file at {}, using defaults", config_path.display());
        }
        Err(err) => {
            return Err(ConfigError::Io(format!("{}: {err}", config_path.display())));
        }
    }

    apply_env(&mut config, env)?;
    Ok(config)
}
