use thiserror::Error;

/// Malformed crypto frames or keys. Never retried.
///
/// Variants never carry plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid encoding key: {0}")]
    InvalidKey(String),

    #[error("invalid base64 ciphertext")]
    InvalidBase64,

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("invalid padding")]
    InvalidPadding,

    #[error("frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("declared length {declared} exceeds available {available} bytes")]
    LengthOutOfBounds { declared: usize, available: usize },

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors surfaced while verifying and decoding one inbound callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Missing envelope fields or signature mismatch.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("decode error: {0}")]
    Decode(#[from] CryptoError),

    /// Malformed decrypted body. The dispatcher drops these.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Failures calling the workflow API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// No response received (connect error, reset, timeout).
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },

    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Server-supplied `Retry-After` hint, in milliseconds.
        retry_after_ms: Option<u64>,
    },

    /// Non-zero application code, even on HTTP 200.
    #[error("workflow API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl WorkflowError {
    /// HTTP statuses that are worth another attempt.
    pub const RETRYABLE_STATUSES: [u16; 4] = [429, 500, 502, 503];

    /// Transient remote failures: no response at all, or a retryable status.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Network { .. } => true,
            WorkflowError::Http { status, .. } => Self::RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// The `Retry-After` hint of a 429 response, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            WorkflowError::Http {
                status: 429,
                retry_after_ms,
                ..
            } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Failures calling the chat platform API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("chat API error {errcode}: {errmsg}")]
    Api { errcode: i64, errmsg: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Errors from the context cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache query error: {0}")]
    Query(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}
