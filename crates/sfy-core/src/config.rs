//! Toolkit configuration
//!
//! Every field has a default matching the production deployment, so an empty
//! JSON object (or no config at all) is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::cookie::{is_valid_key, CookieScope};
use crate::error::ConfigError;
use crate::storage::{StoreOptions, DEFAULT_LEGACY_THRESHOLD};

/// Toolkit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Storage key holding the visit history.
    pub history_key: String,

    /// Beacon endpoint, ending where the query parameters start.
    pub record_url: String,

    /// First-party cookie carrying the global id.
    pub identity_key: String,

    /// Page of the identity handshake frame.
    pub handshake_url: String,

    /// `document.domain` set before talking to the handshake frame.
    pub document_domain: Option<String>,

    /// Rolling dedup window.
    pub dedup_window_ms: u64,

    /// Lifetime of the persisted history.
    pub persist_ttl_ms: u64,

    /// Handshake readiness polling interval.
    pub poll_interval_ms: u64,

    /// Give up on the handshake after this long.
    pub handshake_timeout_ms: u64,

    /// Maximum digests kept per window; unbounded when absent.
    pub history_cap: Option<usize>,

    /// Engine version below which the userData container is used.
    pub legacy_engine_threshold: f32,

    /// Scope of cookies written by the cookie adapter.
    pub cookie_scope: CookieScope,

    /// `log` level filter name (`"off"`, `"error"`, ..., `"trace"`).
    pub log_level: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            history_key: "sfy_rt".to_string(),
            record_url: "//r.sax.sina.com.cn/visit?".to_string(),
            identity_key: "SINAGLOBAL".to_string(),
            handshake_url: "//beacon.sina.com.cn/data.html".to_string(),
            document_domain: Some("sina.com.cn".to_string()),
            dedup_window_ms: 24 * 60 * 60 * 1000,
            persist_ttl_ms: 48 * 60 * 60 * 1000,
            poll_interval_ms: 500,
            handshake_timeout_ms: 5000,
            history_cap: None,
            legacy_engine_threshold: DEFAULT_LEGACY_THRESHOLD,
            cookie_scope: CookieScope::default(),
            log_level: "error".to_string(),
        }
    }
}

impl ToolkitConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_key.is_empty() {
            return Err(ConfigError::Empty { field: "history_key" });
        }
        if self.record_url.is_empty() {
            return Err(ConfigError::Empty { field: "record_url" });
        }
        if !is_valid_key(&self.identity_key) {
            return Err(ConfigError::InvalidIdentityKey(self.identity_key.clone()));
        }
        if self.dedup_window_ms == 0 {
            return Err(ConfigError::Zero { field: "dedup_window_ms" });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "poll_interval_ms" });
        }
        for (field, value) in [
            ("dedup_window_ms", self.dedup_window_ms),
            ("persist_ttl_ms", self.persist_ttl_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
        ] {
            if i64::try_from(value).is_err() {
                return Err(ConfigError::OutOfRange { field });
            }
        }
        if self.persist_ttl_ms < self.dedup_window_ms {
            return Err(ConfigError::TtlShorterThanWindow {
                persist: self.persist_ttl_ms,
                window: self.dedup_window_ms,
            });
        }
        if self.history_cap == Some(0) {
            return Err(ConfigError::Zero { field: "history_cap" });
        }
        Ok(())
    }

    /// Level for the `log` facade; unknown names fall back to `Error`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Error)
    }

    /// Store options for a page on `hostname`.
    pub fn store_options(&self, hostname: &str) -> StoreOptions {
        StoreOptions {
            store_name: hostname.to_string(),
            cookie_scope: self.cookie_scope.clone(),
            legacy_threshold: self.legacy_engine_threshold,
        }
    }
}
