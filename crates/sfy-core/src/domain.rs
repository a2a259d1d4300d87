//! Registrable-domain split for visit keys
//!
//! A host is split into its subdomain labels and the registrable domain,
//! using a short fixed suffix list rather than the full Public Suffix List.
//! The list is part of the visit key derivation, so extending it changes
//! which pages share a digest.
//!
//! # Examples
//!
//! ```
//! use sfy_core::domain::parse_domain;
//!
//! assert_eq!(parse_domain("foo.bar.sina.com.cn"), vec!["foo", "bar", "sina.com.cn"]);
//! assert_eq!(parse_domain("foo1.foo2.bar"), vec!["foo1.foo2.bar"]);
//! ```

/// Known public suffixes.
pub const KNOWN_SUFFIXES: &[&str] = &[
    "com", "com.cn", "cn", "net", "net.cn", "org", "org.cn", "edu", "com.hk",
    "gov", "gov.cn", "im", "int", "mil", "biz", "cc", "tv", "info", "mobi",
    "asia", "cd", "travel", "pro", "io", "me",
];

/// Check whether a dotted suffix is on the known list.
#[inline]
pub fn is_known_suffix(suffix: &str) -> bool {
    KNOWN_SUFFIXES.contains(&suffix)
}

/// Drop a single leading `www.`.
#[inline]
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Split a host into subdomain labels followed by the registrable domain.
///
/// Labels are walked right to left, growing the candidate suffix while it is
/// a known suffix. The first candidate that is not known becomes the
/// registrable domain and every label to its left is kept as is. When the
/// rightmost label is already unknown the host has no recognisable suffix and
/// is returned whole. A host made only of known suffixes yields nothing. An
/// empty label ends the walk, and a single-label host always comes back as
/// one segment, even when that label is itself a suffix.
pub fn parse_domain(host: &str) -> Vec<String> {
    let labels: Vec<&str> = host.split('.').collect();
    let last = labels.len() - 1;

    let mut result: Vec<String> = Vec::new();
    let mut candidate = String::new();
    let mut registrable_at: Option<usize> = None;

    for idx in (0..labels.len()).rev() {
        let label = labels[idx];
        if label.is_empty() {
            break;
        }

        if registrable_at.is_some() {
            result.push(label.to_string());
            continue;
        }

        candidate = if candidate.is_empty() {
            label.to_string()
        } else {
            format!("{}.{}", label, candidate)
        };

        if !is_known_suffix(&candidate) {
            result.push(candidate.clone());
            registrable_at = Some(idx);
        }
    }

    result.reverse();

    match registrable_at {
        Some(idx) if idx == last => vec![result.join(".")],
        Some(_) => result,
        None if last == 0 => vec![result.join(".")],
        None => result,
    }
}
