//! Key/value store with expiry emulation
//!
//! One [`KeyValueStore`] fronts exactly one of three backing media, chosen
//! once when the store is opened:
//!
//! 1. `localStorage`, when the host has it;
//! 2. the userData behaviour element, on legacy engines below the threshold;
//! 3. cookies, otherwise.
//!
//! Values are plain strings. An optional ttl is folded into the stored string
//! (see [`entry`]) and checked lazily on read. Keys written without a ttl are
//! session scoped: they are tracked in a [`SessionRegistry`] and removed when
//! the page unloads.
//!
//! Nothing here returns an error to the caller. Medium failures (quota,
//! security restrictions, a broken userData element) are logged and turned
//! into `None` or a no-op.

mod adapter;
pub mod entry;
pub mod session;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use adapter::{
    legacy_engine_version, select_adapter, Adapter, AdapterKind, BehaviorDocument, Capabilities, CookieAdapter,
    LocalAdapter, UserDataAdapter, WebStorage, USER_DATA_LIFETIME_MS,
};
pub use entry::{StoredEntry, EXPIRES_DELIMITER};
pub use session::SessionRegistry;

use crate::clock::Clock;
use crate::cookie::{CookieDocument, CookieScope};
use crate::error::StoreError;
use crate::event::{EventTarget, UNLOAD_EVENT};

/// Default engine version below which the userData container is used.
pub const DEFAULT_LEGACY_THRESHOLD: f32 = 8.0;

/// Everything the host can offer as a backing medium.
pub struct Media {
    pub local: Option<Box<dyn WebStorage>>,
    pub document: Option<Box<dyn BehaviorDocument>>,
    pub cookies: Box<dyn CookieDocument>,
    pub legacy_engine_version: Option<f32>,
}

impl Media {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            local_storage: self.local.is_some(),
            legacy_engine_version: self.legacy_engine_version,
        }
    }
}

/// Options fixed when a store is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// userData persistence name, the page hostname.
    pub store_name: String,
    pub cookie_scope: CookieScope,
    pub legacy_threshold: f32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            store_name: String::new(),
            cookie_scope: CookieScope::default(),
            legacy_threshold: DEFAULT_LEGACY_THRESHOLD,
        }
    }
}

/// Uniform get/set/remove with optional expiry over one backing medium.
pub struct KeyValueStore {
    adapter: Adapter,
    clock: Rc<dyn Clock>,
    session: RefCell<SessionRegistry>,
    unload_bound: Cell<bool>,
}

impl KeyValueStore {
    /// Probe the media once and open the store on the selected adapter.
    pub fn open(media: Media, clock: Rc<dyn Clock>, options: &StoreOptions) -> Self {
        let kind = select_adapter(&media.capabilities(), options.legacy_threshold);
        log::debug!("storage: using {}", kind);

        let adapter = match kind {
            AdapterKind::Local => match media.local {
                Some(local) => Adapter::Local(LocalAdapter::new(local)),
                None => Adapter::Cookie(CookieAdapter::new(media.cookies, options.cookie_scope.clone())),
            },
            AdapterKind::LegacyDocument => Adapter::LegacyDocument(UserDataAdapter::new(
                media.document,
                &options.store_name,
                clock.now_millis(),
            )),
            AdapterKind::Cookie => {
                Adapter::Cookie(CookieAdapter::new(media.cookies, options.cookie_scope.clone()))
            }
        };

        Self::with_adapter(adapter, clock)
    }

    pub fn with_adapter(adapter: Adapter, clock: Rc<dyn Clock>) -> Self {
        Self {
            adapter,
            clock,
            session: RefCell::new(SessionRegistry::new()),
            unload_bound: Cell::new(false),
        }
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.adapter.kind()
    }

    /// Read a value, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let raw = match self.adapter.get_item(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                log::debug!("storage.get: {}", e);
                return None;
            }
        };

        log::debug!("storage.get: get value of {}:{}", key, raw);
        let entry = entry::decode(&raw);
        if entry.is_expired(self.clock.now_millis()) {
            self.remove(key);
            return None;
        }
        Some(entry.value.to_string())
    }

    /// Write a value. Without a ttl (or with zero) the key is session scoped.
    pub fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) {
        if value.contains(EXPIRES_DELIMITER) {
            log::error!("storage.set: {}", StoreError::ReservedDelimiter(key.to_string()));
            return;
        }

        let ttl = ttl_ms.filter(|&ttl| ttl > 0);
        let expires_at = ttl.map(|ttl| {
            let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
            self.clock.now_millis().saturating_add(ttl)
        });
        let raw = entry::encode(value, expires_at);

        match self.adapter.set_item(key, &raw, expires_at) {
            Ok(()) => {
                let mut session = self.session.borrow_mut();
                if ttl.is_some() {
                    session.unregister(key);
                } else {
                    session.register(key);
                }
            }
            Err(e) => log::error!("storage.set: {}", e),
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.adapter.remove_item(key) {
            log::error!("storage.remove: {}", e);
        }
        self.session.borrow_mut().unregister(key);
    }

    /// Whether `key` will be purged at unload.
    pub fn is_session_key(&self, key: &str) -> bool {
        self.session.borrow().contains(key)
    }

    /// Remove every session-scoped key. Returns how many removals succeeded.
    ///
    /// A failing key is logged and skipped; the registry always ends empty.
    pub fn purge_session(&self) -> usize {
        let keys = self.session.borrow_mut().drain();
        let mut removed = 0;
        for key in keys {
            match self.adapter.remove_item(&key) {
                Ok(()) => removed += 1,
                Err(e) => log::debug!("storage: session purge of {} failed, {}", key, e),
            }
        }
        removed
    }

    /// Purge session keys when the page unloads. Binding twice is a no-op.
    pub fn bind_unload(self: &Rc<Self>, events: &dyn EventTarget) {
        if self.unload_bound.replace(true) {
            return;
        }

        let store = Rc::downgrade(self);
        let mut fired = false;
        events.on(
            UNLOAD_EVENT,
            Box::new(move || {
                if fired {
                    return;
                }
                fired = true;
                if let Some(store) = store.upgrade() {
                    let removed = store.purge_session();
                    log::debug!("storage: purged {} session keys", removed);
                }
            }),
        );
    }
}
