//! Visit history payload
//!
//! The digests of pages already recorded in the current window, stored as
//! `hash1|hash2|...|hashN$windowStart`. Newest digest first.

/// Separator between digests.
pub const HASH_SEPARATOR: char = '|';

/// Separator between the digest list and the window start.
pub const WINDOW_SEPARATOR: char = '$';

/// Decoded visit history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitHistory {
    hashes: Vec<String>,
    window_start: Option<i64>,
}

/// Result of decoding a stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Window still open.
    Live(VisitHistory),
    /// Window older than the dedup window; discard and purge.
    Expired,
    /// No usable window start.
    Malformed,
}

impl VisitHistory {
    /// Empty history opening its window at `window_start`.
    pub fn starting_at(window_start: i64) -> Self {
        Self {
            hashes: Vec::new(),
            window_start: Some(window_start),
        }
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    pub fn window_start(&self) -> Option<i64> {
        self.window_start
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.hashes.iter().any(|h| h == digest)
    }

    /// Decode a stored payload as of `now`.
    ///
    /// The window is rolling: it expires once `now - window_start` exceeds
    /// `window_ms`, regardless of calendar days. Empty digests are skipped
    /// and repeats dropped.
    pub fn decode(raw: &str, now: i64, window_ms: i64) -> Decoded {
        let (list, start) = match raw.split_once(WINDOW_SEPARATOR) {
            Some(parts) => parts,
            None => return Decoded::Malformed,
        };

        let window_start: i64 = match start.trim().parse() {
            Ok(start) => start,
            Err(_) => return Decoded::Malformed,
        };

        // A start too far from `now` to subtract is long expired.
        if now.checked_sub(window_start).map_or(true, |age| age > window_ms) {
            return Decoded::Expired;
        }

        let mut history = Self::starting_at(window_start);
        for digest in list.split(HASH_SEPARATOR).filter(|d| !d.is_empty()) {
            if !history.contains(digest) {
                history.hashes.push(digest.to_string());
            }
        }
        Decoded::Live(history)
    }

    /// Encode for storage. A history without a window start encodes with 0.
    pub fn encode(&self) -> String {
        let mut out = self.hashes.join(&HASH_SEPARATOR.to_string());
        out.push(WINDOW_SEPARATOR);
        out.push_str(&self.window_start.unwrap_or(0).to_string());
        out
    }

    /// Record a digest as the newest entry.
    ///
    /// Returns `false` when it was already present. With a `cap`, the oldest
    /// digests beyond it are dropped.
    pub fn record(&mut self, digest: &str, cap: Option<usize>) -> bool {
        if self.contains(digest) {
            return false;
        }
        self.hashes.insert(0, digest.to_string());
        if let Some(cap) = cap {
            self.hashes.truncate(cap.max(1));
        }
        true
    }
}
