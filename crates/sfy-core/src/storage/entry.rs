//! Inline expiry encoding
//!
//! Every stored value carries its own expiry as a suffix,
//! `<value>;expires=<epochMillis>`, because none of the backing media has a
//! per-key expiry of its own. Entries are only checked when read.

/// Delimiter between a value and its expiry timestamp.
pub const EXPIRES_DELIMITER: &str = ";expires=";

/// A decoded stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEntry<'a> {
    pub value: &'a str,
    pub expires_at: Option<i64>,
}

impl StoredEntry<'_> {
    /// Expired strictly after `expires_at`.
    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}

/// Encode a value with an optional absolute expiry.
pub fn encode(value: &str, expires_at: Option<i64>) -> String {
    match expires_at {
        Some(at) => format!("{}{}{}", value, EXPIRES_DELIMITER, at),
        None => value.to_string(),
    }
}

/// Decode a raw stored string.
///
/// The expiry is read like `parseInt`: leading digits only. An expiry that
/// does not parse means the entry never expires.
pub fn decode(raw: &str) -> StoredEntry<'_> {
    match raw.split_once(EXPIRES_DELIMITER) {
        Some((value, rest)) => {
            let expiry = rest.split(EXPIRES_DELIMITER).next().unwrap_or(rest);
            StoredEntry {
                value,
                expires_at: parse_leading_int(expiry),
            }
        }
        None => StoredEntry {
            value: raw,
            expires_at: None,
        },
    }
}

/// Parse leading decimal digits after optional whitespace and sign.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}
