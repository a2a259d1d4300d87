//! WebAssembly bindings for the sfy retargeting toolkit
//!
//! `init` opens the key/value store on the best medium the page offers and
//! binds the unload purge. `retarget` then resolves the global id (cookie
//! first, handshake frame otherwise) and records the visit once it is known.

pub mod browser;
pub mod console;
pub mod net;

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use sfy_core::clock::Clock;
use sfy_core::identity::{handshake_src, read_identity_cookie};
use sfy_core::storage::{legacy_engine_version, StoreOptions, WebStorage};
use sfy_core::url::resolve_top_url;
use sfy_core::{
    IdentityResolver, KeyValueStore, Media, ResolveState, ToolkitConfig, VisitDeduplicator,
    VisitKey, VisitOutcome, VisitRequest,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::browser::{
    document_mode, BrowserClock, DocumentCookies, LocalStorage, UserDataElement, WindowEvents,
    WindowFrame,
};
use crate::net::{HandshakeIframe, ImageBeacon};

struct Toolkit {
    config: ToolkitConfig,
    clock: Rc<BrowserClock>,
    store: Rc<KeyValueStore>,
    /// Owns the unload listener.
    #[allow(dead_code)]
    events: WindowEvents,
    visits: VisitDeduplicator,
}

thread_local! {
    static TOOLKIT: OnceCell<Toolkit> = OnceCell::new();
}

fn with_toolkit<R>(f: impl FnOnce(&Toolkit) -> R) -> Option<R> {
    TOOLKIT.with(|cell| cell.get().map(f))
}

fn not_initialized() -> JsValue {
    JsValue::from_str("Not initialized. Call init() first.")
}

fn page() -> Result<(Window, web_sys::Document), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;
    Ok((window, document))
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Initialize the toolkit, optionally from a JSON config.
#[wasm_bindgen]
pub fn init(config_json: Option<String>) -> Result<(), JsValue> {
    if is_initialized() {
        return Err(JsValue::from_str("Already initialized. Reload the page to reinitialize."));
    }

    let config = match config_json {
        Some(text) => ToolkitConfig::from_json(&text)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        None => ToolkitConfig::default(),
    };
    console::install(config.level_filter());

    let (window, document) = page()?;
    let cookies = DocumentCookies::new(&document)
        .ok_or_else(|| JsValue::from_str("Document has no cookie jar"))?;
    let user_agent = window.navigator().user_agent().unwrap_or_default();

    let media = Media {
        local: LocalStorage::open(&window).map(|local| Box::new(local) as Box<dyn WebStorage>),
        document: Some(Box::new(UserDataElement::new(document.clone()))),
        cookies: Box::new(cookies),
        legacy_engine_version: legacy_engine_version(&user_agent, document_mode(&document)),
    };
    let hostname = window.location().hostname().unwrap_or_default();
    let options: StoreOptions = config.store_options(&hostname);

    let clock = Rc::new(BrowserClock);
    let store = Rc::new(KeyValueStore::open(media, clock.clone(), &options));
    let events = WindowEvents::new(window);
    store.bind_unload(&events);

    let visits = VisitDeduplicator::new(
        store.clone(),
        clock.clone(),
        Rc::new(ImageBeacon::default()),
        &config,
    );

    TOOLKIT
        .with(|cell| {
            cell.set(Toolkit {
                config,
                clock,
                store,
                events,
                visits,
            })
        })
        .map_err(|_| JsValue::from_str("Failed to set toolkit state"))?;

    log::debug!("sfy: initialized");
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    TOOLKIT.with(|cell| cell.get().is_some())
}

// =============================================================================
// Storage
// =============================================================================

#[wasm_bindgen]
pub fn storage_get(key: &str) -> Result<Option<String>, JsValue> {
    with_toolkit(|toolkit| toolkit.store.get(key)).ok_or_else(not_initialized)
}

/// Store a value for `ttl_ms` milliseconds; without a positive ttl the value
/// lasts until the page unloads.
#[wasm_bindgen]
pub fn storage_set(key: &str, value: &str, ttl_ms: Option<f64>) -> Result<(), JsValue> {
    let ttl = ttl_from_js(ttl_ms);
    with_toolkit(|toolkit| toolkit.store.set(key, value, ttl)).ok_or_else(not_initialized)
}

/// Map a JS ttl to whole milliseconds. Missing, NaN, zero and negative ttls
/// mean session scope; fractions round up so a positive ttl never becomes 0.
fn ttl_from_js(ttl_ms: Option<f64>) -> Option<u64> {
    ttl_ms
        .filter(|ttl| *ttl > 0.0)
        .map(|ttl| ttl.ceil() as u64)
}

#[wasm_bindgen]
pub fn storage_remove(key: &str) -> Result<(), JsValue> {
    with_toolkit(|toolkit| toolkit.store.remove(key)).ok_or_else(not_initialized)
}

/// Name of the medium the store writes through.
#[wasm_bindgen]
pub fn storage_medium() -> Option<String> {
    with_toolkit(|toolkit| toolkit.store.adapter_kind().to_string())
}

// =============================================================================
// Helpers
// =============================================================================

#[wasm_bindgen(js_name = hash)]
pub fn string_hash(input: &str) -> String {
    sfy_core::hash(input)
}

/// Key and digest a visit by `identity` on `url` would be recorded under.
#[wasm_bindgen]
pub fn visit_key(identity: &str, url: &str) -> JsValue {
    let key = VisitKey::derive(identity, url);
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"composite".into(), &JsValue::from(key.composite()));
    let _ = js_sys::Reflect::set(&result, &"digest".into(), &JsValue::from(key.digest()));
    result.into()
}

// =============================================================================
// Retargeting
// =============================================================================

/// Resolve the global id and record this page visit once it is known.
#[wasm_bindgen]
pub fn retarget() -> Result<(), JsValue> {
    let (config, clock) = with_toolkit(|toolkit| (toolkit.config.clone(), toolkit.clock.clone()))
        .ok_or_else(not_initialized)?;
    let (window, document) = page()?;

    let mut resolver = IdentityResolver::from_config(&config);
    let cookie = DocumentCookies::new(&document)
        .and_then(|cookies| read_identity_cookie(&cookies, &config.identity_key));
    let now = clock.now_millis();

    if let ResolveState::Resolved(identity) = resolver.start(cookie, now) {
        record_visit(&window, identity);
        return Ok(());
    }

    let src = handshake_src(&config.handshake_url, now);
    let frame = match HandshakeIframe::embed(&document, &src, config.document_domain.as_deref()) {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("identity: cannot embed handshake frame, {}", e);
            return Ok(());
        }
    };

    let interval = Rc::new(Cell::new(None::<i32>));
    let tick_interval = interval.clone();
    let tick_window = window.clone();
    let tick = Closure::wrap(Box::new(move || {
        if resolver.state().is_terminal() {
            return;
        }
        let state = resolver.tick(clock.now_millis(), &frame).clone();
        if !state.is_terminal() {
            return;
        }
        if let Some(handle) = tick_interval.take() {
            tick_window.clear_interval_with_handle(handle);
        }
        match state {
            ResolveState::Resolved(identity) => record_visit(&tick_window, &identity),
            other => log::debug!("identity: handshake ended {:?}", other),
        }
    }) as Box<dyn FnMut()>);

    let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        config.poll_interval_ms.min(i32::MAX as u64) as i32,
    )?;
    interval.set(Some(handle));
    // The interval is cleared on the terminal tick; the closure lives for the page.
    tick.forget();
    Ok(())
}

fn record_visit(window: &Window, identity: &str) {
    let top_url = resolve_top_url(&WindowFrame::new(window.clone()));
    let search = window.location().search().unwrap_or_default();
    let request = VisitRequest {
        identity: identity.to_string(),
        top_url,
        click_param: search.strip_prefix('?').unwrap_or(&search).to_string(),
    };

    match with_toolkit(|toolkit| toolkit.visits.run(&request)) {
        Some(VisitOutcome::Recorded { digest, .. }) => log::debug!("visit: recorded {}", digest),
        Some(outcome) => log::debug!("visit: {:?}", outcome),
        None => log::error!("visit: toolkit not initialized"),
    }
}
