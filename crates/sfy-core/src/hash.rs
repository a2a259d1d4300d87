//! String hashing and short random ids
//!
//! The visit digest is a 32-bit multiplicative rolling hash (`h * 31 + c`)
//! over UTF-16 code units, printed in radix 36. Digests are persisted in
//! visit history payloads, so the exact arithmetic is part of the stored
//! format and must not change.

const RADIX36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Upper bound (exclusive) for [`random_id`].
const RANDOM_ID_SPAN: f64 = 2_147_483_648.0;

// =============================================================================
// Radix 36
// =============================================================================

/// Format an unsigned integer in lowercase radix 36.
pub fn to_radix36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut buf = [0u8; 13];
    let mut pos = buf.len();
    while value > 0 {
        pos -= 1;
        buf[pos] = RADIX36_DIGITS[(value % 36) as usize];
        value /= 36;
    }

    // Only ASCII digits were written.
    String::from_utf8_lossy(&buf[pos..]).into_owned()
}

// =============================================================================
// Hash
// =============================================================================

/// Raw 32-bit rolling hash.
#[inline]
pub fn hash32(s: &str) -> i32 {
    let mut h: i32 = 0;
    for unit in s.encode_utf16() {
        h = (h << 5).wrapping_sub(h).wrapping_add(unit as i32);
    }
    h
}

/// Hash a string into its radix-36 digest.
///
/// The absolute value is taken in 64 bits, so `i32::MIN` still yields a
/// positive digest.
pub fn hash(s: &str) -> String {
    to_radix36((hash32(s) as i64).unsigned_abs())
}

// =============================================================================
// Random
// =============================================================================

/// Radix-36 id from a uniform sample in `[0, 1)`.
pub fn random_id(sample: f64) -> String {
    let n = (sample.clamp(0.0, 1.0) * RANDOM_ID_SPAN).floor() as u64;
    to_radix36(n.min(RANDOM_ID_SPAN as u64 - 1))
}

/// Integer in `[min, max]` from a uniform sample in `[0, 1)`.
pub fn rand_between(min: i64, max: i64, sample: f64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let span = (hi - lo + 1) as f64;
    let n = (lo as f64 + sample.clamp(0.0, 1.0) * span).floor() as i64;
    n.min(hi)
}
