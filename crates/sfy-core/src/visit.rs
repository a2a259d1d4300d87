//! Retargeting visit deduplication
//!
//! Once per page load, decide whether this (global id, page group) pair has
//! already been reported in the current window. If not, record its digest in
//! the stored history and fire the visit beacon.
//!
//! The page group is the last three segments of the page's domain and path:
//!
//! ```text
//! www.sina.com.cn/bar1/bar2/       => id@sina.com.cn_bar1_bar2
//! foo.sina.com.cn/bar1/bar2/       => id@sina.com.cn_foo_bar1
//! foo1.foo2.sina.com.cn/bar1/bar2  => id@sina.com.cn_foo2_foo1
//! foo1.foo2.bar/bar1/bar2          => id@foo1.foo2.bar_bar1_bar2
//! ```

use std::rc::Rc;

use crate::beacon::{visit_beacon_url, BeaconSender};
use crate::clock::Clock;
use crate::config::ToolkitConfig;
use crate::domain::{parse_domain, strip_www};
use crate::hash::hash;
use crate::history::{Decoded, VisitHistory};
use crate::storage::KeyValueStore;
use crate::url::parse_url;

/// Number of domain/path segments in a visit key.
pub const KEY_SEGMENTS: usize = 3;

// =============================================================================
// Visit Key
// =============================================================================

/// Page-group segments of a URL: registrable domain first, then subdomain
/// labels from the closest one out, then path segments.
pub fn derive_segments(top_url: &str) -> Vec<String> {
    let parsed = parse_url(top_url);
    let mut segments = parse_domain(strip_www(&parsed.host));

    for part in parsed.pathname.split('/').filter(|p| !p.is_empty()) {
        segments.insert(0, part.to_string());
    }

    segments.reverse();
    segments.truncate(KEY_SEGMENTS);
    segments
}

/// Identity plus page group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitKey {
    pub identity: String,
    pub segments: Vec<String>,
}

impl VisitKey {
    pub fn derive(identity: &str, top_url: &str) -> Self {
        Self {
            identity: identity.to_string(),
            segments: derive_segments(top_url),
        }
    }

    /// `identity@seg1_seg2_seg3`
    pub fn composite(&self) -> String {
        format!("{}@{}", self.identity, self.segments.join("_"))
    }

    pub fn digest(&self) -> String {
        hash(&self.composite())
    }
}

// =============================================================================
// Deduplicator
// =============================================================================

/// Inputs of one visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitRequest {
    /// Resolved global id; empty when unknown.
    pub identity: String,
    /// URL of the top-level page.
    pub top_url: String,
    /// Query string (without `?`) proving an inbound ad click.
    pub click_param: String,
}

/// Why a visit was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoClickParam,
    NoIdentity,
}

/// What a visit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// New in this window: stored and beacon fired.
    Recorded { digest: String, beacon_url: String },
    /// Already reported in this window.
    AlreadySeen { digest: String },
    Skipped(SkipReason),
}

/// Records each (identity, page group) at most once per window.
pub struct VisitDeduplicator {
    store: Rc<KeyValueStore>,
    clock: Rc<dyn Clock>,
    beacon: Rc<dyn BeaconSender>,
    history_key: String,
    record_url: String,
    window_ms: i64,
    persist_ttl_ms: u64,
    history_cap: Option<usize>,
}

impl VisitDeduplicator {
    pub fn new(
        store: Rc<KeyValueStore>,
        clock: Rc<dyn Clock>,
        beacon: Rc<dyn BeaconSender>,
        config: &ToolkitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            beacon,
            history_key: config.history_key.clone(),
            record_url: config.record_url.clone(),
            window_ms: i64::try_from(config.dedup_window_ms).unwrap_or(i64::MAX),
            persist_ttl_ms: config.persist_ttl_ms,
            history_cap: config.history_cap,
        }
    }

    /// Load the history as of `now`. Expired or unreadable payloads are
    /// purged and replaced with an empty history opening today.
    pub fn load_history(&self, now: i64) -> VisitHistory {
        let fresh = || VisitHistory::starting_at(self.clock.start_of_day(now));

        let raw = match self.store.get(&self.history_key) {
            Some(raw) => raw,
            None => return fresh(),
        };

        match VisitHistory::decode(&raw, now, self.window_ms) {
            Decoded::Live(history) => history,
            Decoded::Expired => {
                log::debug!("visit: history window expired, purging");
                self.store.remove(&self.history_key);
                fresh()
            }
            Decoded::Malformed => {
                log::debug!("visit: malformed history {:?}, purging", raw);
                self.store.remove(&self.history_key);
                fresh()
            }
        }
    }

    /// Run the visit algorithm once.
    pub fn run(&self, request: &VisitRequest) -> VisitOutcome {
        let now = self.clock.now_millis();
        let mut history = self.load_history(now);

        let key = VisitKey::derive(&request.identity, &request.top_url);
        let digest = key.digest();
        log::debug!("visit: {} => {}", key.composite(), digest);

        if request.click_param.is_empty() {
            return VisitOutcome::Skipped(SkipReason::NoClickParam);
        }
        if request.identity.is_empty() {
            return VisitOutcome::Skipped(SkipReason::NoIdentity);
        }
        if !history.record(&digest, self.history_cap) {
            return VisitOutcome::AlreadySeen { digest };
        }

        let beacon_url = visit_beacon_url(
            &self.record_url,
            &request.click_param,
            &request.top_url,
            &request.identity,
        );
        self.beacon.fire(&beacon_url);

        self.store
            .set(&self.history_key, &history.encode(), Some(self.persist_ttl_ms));

        VisitOutcome::Recorded { digest, beacon_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DAY_MS;
    use crate::storage::{Adapter, LocalAdapter};
    use crate::testing::{ManualClock, MemoryStorage, RecordingBeacon};

    const TOP_URL: &str = "http://foo.bar.sina.com.cn/news/2021/";

    struct Fixture {
        clock: Rc<ManualClock>,
        storage: MemoryStorage,
        beacon: RecordingBeacon,
        dedup: VisitDeduplicator,
    }

    fn fixture_with(now: i64, config: ToolkitConfig) -> Fixture {
        let clock = Rc::new(ManualClock::new(now));
        let storage = MemoryStorage::new();
        let store = Rc::new(KeyValueStore::with_adapter(
            Adapter::Local(LocalAdapter::new(Box::new(storage.clone()))),
            clock.clone(),
        ));
        let beacon = RecordingBeacon::new();
        let dedup = VisitDeduplicator::new(store, clock.clone(), Rc::new(beacon.clone()), &config);
        Fixture {
            clock,
            storage,
            beacon,
            dedup,
        }
    }

    fn fixture(now: i64) -> Fixture {
        fixture_with(now, ToolkitConfig::default())
    }

    fn request(identity: &str, click: &str) -> VisitRequest {
        VisitRequest {
            identity: identity.to_string(),
            top_url: TOP_URL.to_string(),
            click_param: click.to_string(),
        }
    }

    #[test]
    fn test_derive_segments() {
        assert_eq!(derive_segments(TOP_URL), vec!["sina.com.cn", "bar", "foo"]);
        assert_eq!(derive_segments("http://www.sina.com.cn/bar1/bar2/"), vec!["sina.com.cn", "bar1", "bar2"]);
        assert_eq!(derive_segments("http://foo.sina.com.cn/bar1/bar2/"), vec!["sina.com.cn", "foo", "bar1"]);
        assert_eq!(derive_segments("http://foo1.foo2.sina.com.cn/bar1/bar2"), vec!["sina.com.cn", "foo2", "foo1"]);
        assert_eq!(derive_segments("http://foo1.foo2.bar/bar1/bar2"), vec!["foo1.foo2.bar", "bar1", "bar2"]);
    }

    #[test]
    fn test_visit_key_example() {
        let key = VisitKey::derive("ABC123", TOP_URL);
        assert_eq!(key.composite(), "ABC123@sina.com.cn_bar_foo");
        assert_eq!(key.digest(), "99yu2w");
        assert_eq!(key.digest(), VisitKey::derive("ABC123", TOP_URL).digest());
    }

    #[test]
    fn test_degenerate_url_still_derives() {
        let key = VisitKey::derive("ABC123", "");
        assert_eq!(key.composite(), "ABC123@");
        assert!(!key.digest().is_empty());
    }

    #[test]
    fn test_first_visit_records_and_fires() {
        let now = 10 * DAY_MS + 3_600_000;
        let f = fixture(now);

        let outcome = f.dedup.run(&request("ABC123", "pid=1"));
        let digest = hash("ABC123@sina.com.cn_bar_foo");
        let expected_url = "//r.sax.sina.com.cn/visit?cid=pid%3D1&ref=http%3A%2F%2Ffoo.bar.sina.com.cn%2Fnews%2F2021%2F&ck=ABC123";
        assert_eq!(
            outcome,
            VisitOutcome::Recorded {
                digest: digest.clone(),
                beacon_url: expected_url.to_string(),
            }
        );
        assert_eq!(f.beacon.fired(), vec![expected_url.to_string()]);

        let expires = now + 2 * DAY_MS;
        assert_eq!(
            f.storage.raw("sfy_rt"),
            Some(format!("{}${};expires={}", digest, 10 * DAY_MS, expires))
        );
    }

    #[test]
    fn test_repeat_visit_is_noop() {
        let f = fixture(DAY_MS);
        let req = request("ABC123", "pid=1");

        assert!(matches!(f.dedup.run(&req), VisitOutcome::Recorded { .. }));
        let stored = f.storage.raw("sfy_rt");

        f.clock.advance(60_000);
        assert!(matches!(f.dedup.run(&req), VisitOutcome::AlreadySeen { .. }));
        assert_eq!(f.beacon.fired().len(), 1);
        assert_eq!(f.storage.raw("sfy_rt"), stored);
    }

    #[test]
    fn test_new_page_group_keeps_window_start() {
        let f = fixture(DAY_MS + 1_000);
        f.dedup.run(&request("ABC123", "pid=1"));

        f.clock.advance(3_600_000);
        let other = VisitRequest {
            top_url: "http://sports.sina.com.cn/nba/".to_string(),
            ..request("ABC123", "pid=1")
        };
        assert!(matches!(f.dedup.run(&other), VisitOutcome::Recorded { .. }));

        let first = hash("ABC123@sina.com.cn_bar_foo");
        let second = hash("ABC123@sina.com.cn_sports_nba");
        let raw = f.storage.raw("sfy_rt").unwrap_or_default();
        assert!(raw.starts_with(&format!("{}|{}${};expires=", second, first, DAY_MS)));
        assert_eq!(f.beacon.fired().len(), 2);
    }

    #[test]
    fn test_window_rollover_fires_again() {
        let f = fixture(DAY_MS);
        let req = request("ABC123", "pid=1");
        f.dedup.run(&req);

        f.clock.advance(DAY_MS);
        assert!(matches!(f.dedup.run(&req), VisitOutcome::AlreadySeen { .. }));

        f.clock.advance(1);
        assert!(matches!(f.dedup.run(&req), VisitOutcome::Recorded { .. }));
        assert_eq!(f.beacon.fired().len(), 2);

        let raw = f.storage.raw("sfy_rt").unwrap_or_default();
        let digest = hash("ABC123@sina.com.cn_bar_foo");
        assert!(raw.starts_with(&format!("{}${};", digest, 2 * DAY_MS)));
    }

    #[test]
    fn test_rollover_discards_instead_of_merging() {
        let f = fixture(5 * DAY_MS);
        f.storage.put_raw("sfy_rt", &format!("old1|old2${};expires={}", 3 * DAY_MS, 7 * DAY_MS));

        f.dedup.run(&request("ABC123", "pid=1"));
        let raw = f.storage.raw("sfy_rt").unwrap_or_default();
        assert!(!raw.contains("old1"));
        assert!(!raw.contains("old2"));
    }

    #[test]
    fn test_expired_history_purged_even_when_skipped() {
        let f = fixture(5 * DAY_MS);
        f.storage.put_raw("sfy_rt", &format!("a|b${}", 3 * DAY_MS));

        assert_eq!(
            f.dedup.run(&request("ABC123", "")),
            VisitOutcome::Skipped(SkipReason::NoClickParam)
        );
        assert_eq!(f.storage.raw("sfy_rt"), None);
        assert!(f.beacon.fired().is_empty());
    }

    #[test]
    fn test_malformed_history_treated_as_empty() {
        let f = fixture(5 * DAY_MS);
        let digest = hash("ABC123@sina.com.cn_bar_foo");
        f.storage.put_raw("sfy_rt", &format!("{}$garbage", digest));

        assert!(matches!(
            f.dedup.run(&request("ABC123", "pid=1")),
            VisitOutcome::Recorded { .. }
        ));
    }

    #[test]
    fn test_skips_without_identity_or_click() {
        let f = fixture(DAY_MS);
        assert_eq!(
            f.dedup.run(&request("", "pid=1")),
            VisitOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(
            f.dedup.run(&request("ABC123", "")),
            VisitOutcome::Skipped(SkipReason::NoClickParam)
        );
        assert!(f.beacon.fired().is_empty());
        assert_eq!(f.storage.raw("sfy_rt"), None);
    }

    #[test]
    fn test_history_cap() {
        let config = ToolkitConfig {
            history_cap: Some(2),
            ..ToolkitConfig::default()
        };
        let f = fixture_with(DAY_MS, config);
        for path in ["a", "b", "c"] {
            let req = VisitRequest {
                top_url: format!("http://news.sina.com.cn/{}/", path),
                ..request("ABC123", "pid=1")
            };
            f.dedup.run(&req);
        }

        let raw = f.storage.raw("sfy_rt").unwrap_or_default();
        let (list, _) = raw.split_once('$').unwrap_or_default();
        assert_eq!(list.split('|').count(), 2);
        assert!(!list.contains(&hash("ABC123@sina.com.cn_news_a")));
    }
}
