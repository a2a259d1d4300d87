//! Backing media and the adapters over them

use std::fmt;

use crate::clock::{gmt_string, DAY_MS};
use crate::cookie::{CookieDocument, CookieScope, Cookies};
use crate::error::StoreError;

/// Lifetime of the userData container itself.
pub const USER_DATA_LIFETIME_MS: i64 = 365 * DAY_MS;

// =============================================================================
// Host Media
// =============================================================================

/// Native persistent key/value storage (`window.localStorage`).
pub trait WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// Hidden element carrying the legacy `#default#userData` behaviour.
///
/// Attributes only reach disk after `save` and are only current after `load`.
pub trait BehaviorDocument {
    /// Whether the container element already exists in the document.
    fn is_attached(&self) -> bool;

    /// Create the container and set its own expiry (a GMT date string).
    fn attach(&self, expires: &str) -> Result<(), StoreError>;

    fn load(&self, name: &str) -> Result<(), StoreError>;

    fn save(&self, name: &str) -> Result<(), StoreError>;

    fn get_attribute(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_attribute(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_attribute(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// Adapter Selection
// =============================================================================

/// Which backing medium a store writes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Local,
    LegacyDocument,
    Cookie,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "localStorage",
            Self::LegacyDocument => "userData",
            Self::Cookie => "cookie",
        })
    }
}

/// What the host offers, probed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Capabilities {
    pub local_storage: bool,
    /// Version of a legacy engine (document mode), if the host is one.
    pub legacy_engine_version: Option<f32>,
}

/// Legacy engine version from a user agent string.
///
/// Only engines announcing `MSIE x.y` count; their document mode, when set,
/// takes precedence over the announced version.
pub fn legacy_engine_version(user_agent: &str, document_mode: Option<f64>) -> Option<f32> {
    let lower = user_agent.to_ascii_lowercase();
    let start = lower.find("msie ")? + "msie ".len();
    let rest = &lower[start..];

    let major_end = rest.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(rest.len());
    let minor = rest[major_end..].strip_prefix('.')?;
    let minor_end = minor.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(minor.len());
    if major_end == 0 || minor_end == 0 {
        return None;
    }

    match document_mode.filter(|mode| *mode > 0.0) {
        Some(mode) => Some(mode as f32),
        None => rest[..major_end + 1 + minor_end].parse().ok(),
    }
}

/// Pick the adapter for a set of capabilities.
///
/// Native storage wins; a legacy engine below `legacy_threshold` falls back
/// to the userData container; everything else uses cookies.
pub fn select_adapter(caps: &Capabilities, legacy_threshold: f32) -> AdapterKind {
    if caps.local_storage {
        return AdapterKind::Local;
    }
    match caps.legacy_engine_version {
        Some(version) if version < legacy_threshold => AdapterKind::LegacyDocument,
        _ => AdapterKind::Cookie,
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// `localStorage` adapter.
pub struct LocalAdapter {
    storage: Box<dyn WebStorage>,
}

impl LocalAdapter {
    pub fn new(storage: Box<dyn WebStorage>) -> Self {
        Self { storage }
    }
}

/// userData adapter: load before every read, save after every write.
pub struct UserDataAdapter {
    document: Option<Box<dyn BehaviorDocument>>,
    name: String,
    container_expires: String,
}

impl UserDataAdapter {
    /// `name` is the persistence name (the page hostname); `now` dates the
    /// container's own one-year expiry.
    pub fn new(document: Option<Box<dyn BehaviorDocument>>, name: &str, now: i64) -> Self {
        Self {
            document,
            name: name.to_string(),
            container_expires: gmt_string(now + USER_DATA_LIFETIME_MS),
        }
    }

    fn container(&self) -> Result<&dyn BehaviorDocument, StoreError> {
        let doc = self
            .document
            .as_deref()
            .ok_or_else(|| StoreError::DocumentUnavailable("no userData host".to_string()))?;

        if !doc.is_attached() {
            doc.attach(&self.container_expires).map_err(|e| {
                log::debug!("storage: userData init fail, {}", e);
                StoreError::DocumentUnavailable(e.to_string())
            })?;
        }
        Ok(doc)
    }
}

/// Cookie adapter.
pub struct CookieAdapter {
    document: Box<dyn CookieDocument>,
    scope: CookieScope,
}

impl CookieAdapter {
    pub fn new(document: Box<dyn CookieDocument>, scope: CookieScope) -> Self {
        Self { document, scope }
    }
}

/// The adapter a store was opened with.
pub enum Adapter {
    Local(LocalAdapter),
    LegacyDocument(UserDataAdapter),
    Cookie(CookieAdapter),
}

impl Adapter {
    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Local(_) => AdapterKind::Local,
            Self::LegacyDocument(_) => AdapterKind::LegacyDocument,
            Self::Cookie(_) => AdapterKind::Cookie,
        }
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Local(a) => a.storage.get_item(key),
            Self::LegacyDocument(a) => {
                let doc = a.container()?;
                doc.load(&a.name)?;
                doc.get_attribute(key)
            }
            Self::Cookie(a) => Cookies::new(a.document.as_ref()).get(key),
        }
    }

    /// Write an already encoded entry. `expires_at` is only used by media
    /// with a native expiry (cookies).
    pub fn set_item(&self, key: &str, raw: &str, expires_at: Option<i64>) -> Result<(), StoreError> {
        match self {
            Self::Local(a) => a.storage.set_item(key, raw),
            Self::LegacyDocument(a) => {
                let doc = a.container()?;
                doc.load(&a.name)?;
                doc.set_attribute(key, raw)?;
                doc.save(&a.name)
            }
            Self::Cookie(a) => {
                Cookies::new(a.document.as_ref()).set(key, raw, &a.scope.options(expires_at))
            }
        }
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Local(a) => a.storage.remove_item(key),
            Self::LegacyDocument(a) => {
                let doc = a.container()?;
                doc.load(&a.name)?;
                doc.remove_attribute(key)?;
                doc.save(&a.name)
            }
            Self::Cookie(a) => Cookies::new(a.document.as_ref()).remove(key, &a.scope.options(None)),
        }
    }
}
