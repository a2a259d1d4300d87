//! Error types
//!
//! None of these reach a page script. Storage errors are logged and folded
//! into `None`/no-op at the [`KeyValueStore`](crate::storage::KeyValueStore)
//! boundary, URL errors degrade to empty strings, and configuration errors
//! are only surfaced by the wasm `init` entry point.

/// Failure of a backing storage medium.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("quota exceeded while writing '{0}'")]
    QuotaExceeded(String),
    #[error("access denied: {0}")]
    SecurityDenied(String),
    #[error("invalid cookie key: {0:?}")]
    InvalidCookieKey(String),
    #[error("value for '{0}' contains the reserved ';expires=' delimiter")]
    ReservedDelimiter(String),
    #[error("userData container unavailable: {0}")]
    DocumentUnavailable(String),
    #[error("host error: {0}")]
    Host(String),
}

/// Malformed URL component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("malformed percent escape at byte {0}")]
    MalformedEscape(usize),
    #[error("percent escapes do not decode to UTF-8")]
    InvalidUtf8,
}

/// Invalid toolkit configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("identity_key {0:?} is not a valid cookie name")]
    InvalidIdentityKey(String),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} exceeds the representable range of epoch milliseconds")]
    OutOfRange { field: &'static str },
    #[error("persist_ttl_ms ({persist}) must not be shorter than dedup_window_ms ({window})")]
    TtlShorterThanWindow { persist: u64, window: u64 },
}
