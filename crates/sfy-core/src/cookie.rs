//! Cookie key validation and `document.cookie` codec
//!
//! Keys follow the RFC 2068 `token` grammar: printable US-ASCII without
//! separators. Values are stored percent-encoded.

use serde::{Deserialize, Serialize};

use crate::clock::gmt_string;
use crate::error::StoreError;
use crate::url::{decode_uri_component, encode_uri_component};

/// RFC 2068 `tspecials` other than SP and HT.
const SEPARATORS: &[char] = &[
    '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '=', '{', '}',
];

/// Check a key against the cookie `token` grammar.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| {
            let cp = c as u32;
            cp > 0x20 && cp < 0x7f && !SEPARATORS.contains(&c)
        })
}

/// Host access to `document.cookie`.
pub trait CookieDocument {
    /// The full cookie string, `"a=1; b=2"`.
    fn read(&self) -> Result<String, StoreError>;

    /// Assign one `Set-Cookie` style string.
    fn write(&self, cookie: &str) -> Result<(), StoreError>;
}

/// Attributes written with a cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    /// Absolute expiry in epoch milliseconds; `None` makes a session cookie.
    pub expires: Option<i64>,
}

/// Path/domain/secure scope applied to every cookie a store writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieScope {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieScope {
    /// Options for a write in this scope.
    pub fn options(&self, expires: Option<i64>) -> CookieOptions {
        CookieOptions {
            path: self.path.clone(),
            domain: self.domain.clone(),
            secure: self.secure,
            expires,
        }
    }
}

/// Render the string assigned to `document.cookie`.
pub fn format_cookie(key: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", key, value);
    if let Some(path) = &options.path {
        cookie.push_str("; path=");
        cookie.push_str(path);
    }
    if let Some(expires) = options.expires {
        cookie.push_str("; expires=");
        cookie.push_str(&gmt_string(expires));
    }
    if let Some(domain) = &options.domain {
        cookie.push_str("; domain=");
        cookie.push_str(domain);
    }
    if options.secure {
        cookie.push_str("; secure");
    }
    cookie
}

/// Find the raw value of `key` in a cookie string.
pub fn find_raw<'c>(cookies: &'c str, key: &str) -> Option<&'c str> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim_start_matches(' ').strip_prefix(key))
        .find_map(|rest| rest.strip_prefix('='))
        .filter(|value| !value.is_empty())
}

/// Cookie reader/writer over a host document.
pub struct Cookies<'a> {
    doc: &'a dyn CookieDocument,
}

impl<'a> Cookies<'a> {
    pub fn new(doc: &'a dyn CookieDocument) -> Self {
        Self { doc }
    }

    /// Raw (still encoded) value; `None` for invalid keys and empty values.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !is_valid_key(key) {
            return Ok(None);
        }
        let cookies = self.doc.read()?;
        Ok(find_raw(&cookies, key).map(str::to_string))
    }

    /// Write a raw value. Invalid keys are refused and nothing is written.
    pub fn set_raw(&self, key: &str, value: &str, options: &CookieOptions) -> Result<(), StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidCookieKey(key.to_string()));
        }
        self.doc.write(&format_cookie(key, value, options))
    }

    /// Decoded value. A value that does not decode is treated as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_raw(key)?.and_then(|raw| match decode_uri_component(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("cookie '{}': {}", key, e);
                None
            }
        }))
    }

    pub fn set(&self, key: &str, value: &str, options: &CookieOptions) -> Result<(), StoreError> {
        self.set_raw(key, &encode_uri_component(value), options)
    }

    /// Expire the cookie at the epoch.
    pub fn remove(&self, key: &str, options: &CookieOptions) -> Result<(), StoreError> {
        let options = CookieOptions {
            expires: Some(0),
            ..options.clone()
        };
        self.set_raw(key, "", &options)
    }
}
