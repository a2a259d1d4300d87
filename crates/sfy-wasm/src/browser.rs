//! Browser implementations of the core host traits

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use sfy_core::clock::Clock;
use sfy_core::cookie::CookieDocument;
use sfy_core::event::{EventTarget, ListenerId};
use sfy_core::storage::{BehaviorDocument, WebStorage};
use sfy_core::url::FrameContext;
use sfy_core::StoreError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlDocument, HtmlElement, Storage, Window};

/// Id of the hidden userData container element.
pub const USER_DATA_CONTAINER_ID: &str = "sinaadToolkitUserDataContainer";

const USER_DATA_BEHAVIOR: &str = "#default#userData";

// =============================================================================
// Errors
// =============================================================================

/// Classify an exception thrown by the host.
pub fn store_error(err: JsValue, context: &str) -> StoreError {
    let name = js_sys::Reflect::get(&err, &"name".into())
        .ok()
        .and_then(|name| name.as_string())
        .unwrap_or_default();

    match name.as_str() {
        "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED" => {
            StoreError::QuotaExceeded(context.to_string())
        }
        "SecurityError" => StoreError::SecurityDenied(context.to_string()),
        _ => StoreError::Host(format!("{}: {:?}", context, err)),
    }
}

/// Call `target[name](...args)` on an object whose method web-sys does not bind.
pub fn call_method(target: &JsValue, name: &str, args: &[JsValue]) -> Result<JsValue, StoreError> {
    let method = js_sys::Reflect::get(target, &JsValue::from_str(name))
        .map_err(|e| store_error(e, name))?
        .dyn_into::<js_sys::Function>()
        .map_err(|_| StoreError::Host(format!("{} is not a function", name)))?;

    let args: js_sys::Array = args.iter().collect();
    method.apply(target, &args).map_err(|e| store_error(e, name))
}

// =============================================================================
// Clock
// =============================================================================

/// Page clock: `Date.now`, local midnight and `Math.random`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_millis(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn start_of_day(&self, now: i64) -> i64 {
        let date = js_sys::Date::new(&JsValue::from_f64(now as f64));
        js_sys::Date::new_with_year_month_day(
            date.get_full_year(),
            date.get_month() as i32,
            date.get_date() as i32,
        )
        .get_time() as i64
    }

    fn random(&self) -> f64 {
        js_sys::Math::random()
    }
}

// =============================================================================
// Media
// =============================================================================

/// `window.localStorage`.
pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// `None` when the page has no localStorage or access to it throws.
    pub fn open(window: &Window) -> Option<Self> {
        match window.local_storage() {
            Ok(storage) => storage.map(|storage| Self { storage }),
            Err(e) => {
                log::debug!("storage: localStorage unavailable, {:?}", e);
                None
            }
        }
    }
}

impl WebStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(key).map_err(|e| store_error(e, key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage.set_item(key, value).map_err(|e| store_error(e, key))
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.storage.remove_item(key).map_err(|e| store_error(e, key))
    }
}

/// `document.cookie`.
pub struct DocumentCookies {
    document: HtmlDocument,
}

impl DocumentCookies {
    pub fn new(document: &Document) -> Option<Self> {
        document
            .clone()
            .dyn_into::<HtmlDocument>()
            .ok()
            .map(|document| Self { document })
    }
}

impl CookieDocument for DocumentCookies {
    fn read(&self) -> Result<String, StoreError> {
        self.document.cookie().map_err(|e| store_error(e, "document.cookie"))
    }

    fn write(&self, cookie: &str) -> Result<(), StoreError> {
        self.document
            .set_cookie(cookie)
            .map_err(|e| store_error(e, "document.cookie"))
    }
}

/// Hidden `<input>` carrying the userData behaviour, found by id.
pub struct UserDataElement {
    document: Document,
}

impl UserDataElement {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn element(&self) -> Result<Element, StoreError> {
        self.document
            .get_element_by_id(USER_DATA_CONTAINER_ID)
            .ok_or_else(|| StoreError::DocumentUnavailable(USER_DATA_CONTAINER_ID.to_string()))
    }
}

impl BehaviorDocument for UserDataElement {
    fn is_attached(&self) -> bool {
        self.document.get_element_by_id(USER_DATA_CONTAINER_ID).is_some()
    }

    fn attach(&self, expires: &str) -> Result<(), StoreError> {
        let element = self
            .document
            .create_element("input")
            .map_err(|e| store_error(e, "createElement"))?;
        element.set_id(USER_DATA_CONTAINER_ID);
        element
            .set_attribute("type", "hidden")
            .map_err(|e| store_error(e, "type"))?;
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            html.style()
                .set_property("display", "none")
                .map_err(|e| store_error(e, "style"))?;
        }

        call_method(&element, "addBehavior", &[JsValue::from_str(USER_DATA_BEHAVIOR)])?;

        let body = self
            .document
            .body()
            .ok_or_else(|| StoreError::DocumentUnavailable("document.body".to_string()))?;
        body.insert_before(&element, body.first_child().as_ref())
            .map_err(|e| store_error(e, "insertBefore"))?;

        js_sys::Reflect::set(&element, &"expires".into(), &JsValue::from_str(expires))
            .map_err(|e| store_error(e, "expires"))?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<(), StoreError> {
        call_method(self.element()?.as_ref(), "load", &[JsValue::from_str(name)]).map(|_| ())
    }

    fn save(&self, name: &str) -> Result<(), StoreError> {
        call_method(self.element()?.as_ref(), "save", &[JsValue::from_str(name)]).map(|_| ())
    }

    fn get_attribute(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.element()?.get_attribute(key))
    }

    fn set_attribute(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.element()?
            .set_attribute(key, value)
            .map_err(|e| store_error(e, key))
    }

    fn remove_attribute(&self, key: &str) -> Result<(), StoreError> {
        self.element()?
            .remove_attribute(key)
            .map_err(|e| store_error(e, key))
    }
}

/// `document.documentMode`, set by legacy engines only.
pub fn document_mode(document: &Document) -> Option<f64> {
    js_sys::Reflect::get(document, &"documentMode".into())
        .ok()
        .and_then(|mode| mode.as_f64())
}

// =============================================================================
// Window
// =============================================================================

/// Event listeners on `window`, kept alive until removed.
pub struct WindowEvents {
    window: Window,
    next_id: Cell<u32>,
    listeners: RefCell<HashMap<u32, Closure<dyn FnMut()>>>,
}

impl WindowEvents {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            next_id: Cell::new(0),
            listeners: RefCell::new(HashMap::new()),
        }
    }
}

impl EventTarget for WindowEvents {
    fn on(&self, event: &str, handler: Box<dyn FnMut()>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let closure = Closure::wrap(handler);
        if let Err(e) = self
            .window
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        {
            log::error!("events: cannot listen for {}, {:?}", event, e);
        }
        self.listeners.borrow_mut().insert(id, closure);
        ListenerId(id)
    }

    fn off(&self, event: &str, id: ListenerId) {
        let closure = match self.listeners.borrow_mut().remove(&id.0) {
            Some(closure) => closure,
            None => return,
        };
        let _ = self
            .window
            .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    }
}

/// The frame the script was loaded into.
pub struct WindowFrame {
    window: Window,
}

impl WindowFrame {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl FrameContext for WindowFrame {
    fn top_href(&self) -> Result<Option<String>, StoreError> {
        let top = match self.window.top().map_err(|e| store_error(e, "window.top"))? {
            Some(top) => top,
            None => return Ok(None),
        };
        // Reading a cross-origin location throws.
        top.location()
            .href()
            .map(Some)
            .map_err(|_| StoreError::SecurityDenied("top.location.href".to_string()))
    }

    fn is_top(&self) -> bool {
        match self.window.top() {
            Ok(Some(top)) => JsValue::from(top) == JsValue::from(self.window.clone()),
            _ => false,
        }
    }

    fn own_href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn referrer(&self) -> String {
        self.window
            .document()
            .map(|document| document.referrer())
            .unwrap_or_default()
    }
}
