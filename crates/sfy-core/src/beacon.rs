//! Tracking beacon
//!
//! A beacon is a one-way GET issued through a transient image. Its result is
//! never observed; the sender only has to keep the request alive until it
//! settles and then let go of it.

use crate::hash::random_id;
use crate::url::encode_uri_component;

/// Prefix of the cache-busting token appended to beacon URLs.
pub const CACHE_BUSTER_PREFIX: &str = "_sinaads_sio_log_";

/// Fire-and-forget GET.
pub trait BeaconSender {
    fn fire(&self, url: &str);
}

/// Cache-busting token from a uniform sample.
pub fn cache_buster(sample: f64) -> String {
    format!("{}{}", CACHE_BUSTER_PREFIX, random_id(sample))
}

/// Append a bare token as an extra query parameter.
///
/// Joins with `&` when the URL already has a query (a `?` past position 0),
/// otherwise with `?`.
pub fn with_cache_buster(url: &str, token: &str) -> String {
    let joiner = match url.find('?') {
        Some(pos) if pos > 0 => '&',
        _ => '?',
    };
    format!("{}{}{}", url, joiner, token)
}

/// URL actually requested for `url`: cache-busted unless `use_cache`.
pub fn request_url(url: &str, use_cache: bool, sample: f64) -> String {
    if use_cache {
        url.to_string()
    } else {
        with_cache_buster(url, &cache_buster(sample))
    }
}

/// Build the visit beacon URL.
///
/// `record_url` is expected to end where parameters start (with `?`).
pub fn visit_beacon_url(record_url: &str, click_param: &str, top_url: &str, identity: &str) -> String {
    format!(
        "{}cid={}&ref={}&ck={}",
        record_url,
        encode_uri_component(click_param),
        encode_uri_component(top_url),
        encode_uri_component(identity)
    )
}
