//! Time and randomness source

use chrono::{DateTime, Utc};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Wall clock plus a uniform random sample, both supplied by the host.
pub trait Clock {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;

    /// Start of the day containing `now`, in epoch milliseconds.
    ///
    /// The browser clock uses local midnight; the default is UTC midnight.
    fn start_of_day(&self, now: i64) -> i64 {
        now - now.rem_euclid(DAY_MS)
    }

    /// Uniform sample in `[0, 1)`.
    fn random(&self) -> f64;
}

/// Native clock for tools and tests outside the browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn random(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// `Fri, 31 Dec 9999 23:59:59 GMT`.
const MAX_COOKIE_DATE_MS: i64 = 253_402_300_799_000;

/// Render epoch milliseconds as an RFC 1123 GMT date, as cookies expect.
pub fn gmt_string(epoch_ms: i64) -> String {
    // Dates past year 9999 are clamped so they stay in the future.
    let epoch_ms = epoch_ms.min(MAX_COOKIE_DATE_MS);
    match DateTime::<Utc>::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => "Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
    }
}
