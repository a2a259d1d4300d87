//! In-memory host fakes for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono::DateTime;

use crate::beacon::BeaconSender;
use crate::clock::Clock;
use crate::cookie::CookieDocument;
use crate::error::StoreError;
use crate::event::{EventTarget, ListenerId};
use crate::identity::HandshakeFrame;
use crate::storage::{BehaviorDocument, WebStorage};

// =============================================================================
// Clock
// =============================================================================

/// Clock moved by hand; its random sample is always 0.5.
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }

    fn random(&self) -> f64 {
        0.5
    }
}

// =============================================================================
// localStorage
// =============================================================================

#[derive(Default)]
struct StorageInner {
    items: HashMap<String, String>,
    failing_removals: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<StorageInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().items.get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.inner.borrow_mut().items.insert(key.to_string(), value.to_string());
    }

    pub fn fail_removal_of(&self, key: &str) {
        self.inner.borrow_mut().failing_removals.insert(key.to_string());
    }
}

impl WebStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_raw(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_removals.contains(key) {
            return Err(StoreError::SecurityDenied(format!("remove {}", key)));
        }
        inner.items.remove(key);
        Ok(())
    }
}

/// Storage whose every operation fails.
pub struct FailingStorage;

impl WebStorage for FailingStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::SecurityDenied("read".to_string()))
    }

    fn set_item(&self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::QuotaExceeded(key.to_string()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::SecurityDenied("remove".to_string()))
    }
}

// =============================================================================
// Cookies
// =============================================================================

#[derive(Default)]
struct CookieInner {
    jar: Vec<(String, String)>,
    writes: Vec<String>,
}

/// Cookie jar honouring `expires` against the epoch.
#[derive(Clone, Default)]
pub struct MemoryCookies {
    inner: Rc<RefCell<CookieInner>>,
}

impl MemoryCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let cookies = Self::new();
        cookies.inner.borrow_mut().jar = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        cookies
    }

    pub fn last_write(&self) -> Option<String> {
        self.inner.borrow().writes.last().cloned()
    }

    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes.len()
    }
}

impl CookieDocument for MemoryCookies {
    fn read(&self) -> Result<String, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner
            .jar
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; "))
    }

    fn write(&self, cookie: &str) -> Result<(), StoreError> {
        let mut parts = cookie.split("; ");
        let (key, value) = parts
            .next()
            .and_then(|pair| pair.split_once('='))
            .ok_or_else(|| StoreError::Host(format!("bad cookie {}", cookie)))?;

        let expired = parts
            .filter_map(|attr| attr.strip_prefix("expires="))
            .filter_map(|date| DateTime::parse_from_rfc2822(date).ok())
            .any(|date| date.timestamp_millis() <= 0);

        let mut inner = self.inner.borrow_mut();
        inner.writes.push(cookie.to_string());
        inner.jar.retain(|(k, _)| k != key);
        if !expired {
            inner.jar.push((key.to_string(), value.to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// userData
// =============================================================================

#[derive(Default)]
struct DocumentInner {
    attached: bool,
    fail_attach: bool,
    expires: Option<String>,
    working: HashMap<String, String>,
    saved: HashMap<String, HashMap<String, String>>,
    loads: usize,
}

#[derive(Clone, Default)]
pub struct MemoryDocument {
    inner: Rc<RefCell<DocumentInner>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_attach(&self) {
        self.inner.borrow_mut().fail_attach = true;
    }

    pub fn container_expires(&self) -> Option<String> {
        self.inner.borrow().expires.clone()
    }

    pub fn saved(&self, name: &str, key: &str) -> Option<String> {
        self.inner.borrow().saved.get(name).and_then(|m| m.get(key).cloned())
    }

    pub fn load_count(&self) -> usize {
        self.inner.borrow().loads
    }
}

impl BehaviorDocument for MemoryDocument {
    fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    fn attach(&self, expires: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_attach {
            return Err(StoreError::Host("addBehavior is not supported".to_string()));
        }
        inner.attached = true;
        inner.expires = Some(expires.to_string());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.working = inner.saved.get(name).cloned().unwrap_or_default();
        inner.loads += 1;
        Ok(())
    }

    fn save(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let working = inner.working.clone();
        inner.saved.insert(name.to_string(), working);
        Ok(())
    }

    fn get_attribute(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.borrow().working.get(key).cloned())
    }

    fn set_attribute(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().working.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, key: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().working.remove(key);
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Default)]
pub struct RecordingEvents {
    handlers: RefCell<Vec<(String, ListenerId, Box<dyn FnMut()>)>>,
    next_id: Cell<u32>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.borrow().iter().filter(|(e, _, _)| e == event).count()
    }

    pub fn fire(&self, event: &str) {
        for (name, _, handler) in self.handlers.borrow_mut().iter_mut() {
            if name == event {
                handler();
            }
        }
    }
}

impl EventTarget for RecordingEvents {
    fn on(&self, event: &str, handler: Box<dyn FnMut()>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((event.to_string(), id, handler));
        id
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.handlers
            .borrow_mut()
            .retain(|(e, listener, _)| e != event || *listener != id);
    }
}

// =============================================================================
// Beacon and Handshake
// =============================================================================

#[derive(Clone, Default)]
pub struct RecordingBeacon {
    fired: Rc<RefCell<Vec<String>>>,
}

impl RecordingBeacon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> Vec<String> {
        self.fired.borrow().clone()
    }
}

impl BeaconSender for RecordingBeacon {
    fn fire(&self, url: &str) {
        self.fired.borrow_mut().push(url.to_string());
    }
}

/// Handshake frame that becomes ready after a number of probes.
pub struct ScriptedFrame {
    ready_after: u32,
    value: Option<String>,
    probes: Cell<u32>,
}

impl ScriptedFrame {
    pub fn new(ready_after: u32, value: Option<&str>) -> Self {
        Self {
            ready_after,
            value: value.map(str::to_string),
            probes: Cell::new(0),
        }
    }

    pub fn never_ready() -> Self {
        Self::new(u32::MAX, None)
    }

    pub fn probes(&self) -> u32 {
        self.probes.get()
    }
}

impl HandshakeFrame for ScriptedFrame {
    fn is_ready(&self) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.probes.get() > self.ready_after
    }

    fn read(&self, _key: &str) -> Option<String> {
        self.value.clone()
    }
}
