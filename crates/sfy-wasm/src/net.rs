//! Beacon image and identity handshake frame

use std::cell::RefCell;
use std::collections::HashMap;

use sfy_core::beacon::{cache_buster, with_cache_buster, BeaconSender};
use sfy_core::identity::HandshakeFrame;
use sfy_core::StoreError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlIFrameElement, HtmlImageElement, Node};

use crate::browser::{call_method, store_error};

thread_local! {
    /// Beacon images in flight, keyed by their cache-buster token.
    static IN_FLIGHT: RefCell<HashMap<String, HtmlImageElement>> = RefCell::new(HashMap::new());
}

/// Fires GET beacons through detached `Image` elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageBeacon {
    /// Leave the URL without a cache-buster.
    pub use_cache: bool,
}

impl ImageBeacon {
    /// Start the request and return the image carrying it.
    fn send(&self, url: &str) -> Option<HtmlImageElement> {
        let image = match HtmlImageElement::new() {
            Ok(image) => image,
            Err(e) => {
                log::error!("beacon: cannot create image, {:?}", e);
                return None;
            }
        };
        let token = cache_buster(js_sys::Math::random());

        // The image is held until it settles so the request is not collected.
        let settled = {
            let token = token.clone();
            Closure::once_into_js(move || {
                let image = IN_FLIGHT.with(|in_flight| in_flight.borrow_mut().remove(&token));
                if let Some(image) = image {
                    image.set_onload(None);
                    image.set_onerror(None);
                    image.set_onabort(None);
                }
            })
        };
        image.set_onload(Some(settled.unchecked_ref()));
        image.set_onerror(Some(settled.unchecked_ref()));
        image.set_onabort(Some(settled.unchecked_ref()));

        IN_FLIGHT.with(|in_flight| in_flight.borrow_mut().insert(token.clone(), image.clone()));

        let src = if self.use_cache {
            url.to_string()
        } else {
            with_cache_buster(url, &token)
        };
        log::debug!("beacon: {}", src);
        image.set_src(&src);
        Some(image)
    }
}

impl BeaconSender for ImageBeacon {
    fn fire(&self, url: &str) {
        self.send(url);
    }
}

/// Hidden iframe on the id-owning domain exposing `storage.get`.
pub struct HandshakeIframe {
    iframe: HtmlIFrameElement,
}

impl HandshakeIframe {
    /// Relax `document.domain`, then insert the frame before the first script.
    pub fn embed(document: &Document, src: &str, domain: Option<&str>) -> Result<Self, StoreError> {
        if let Some(domain) = domain {
            js_sys::Reflect::set(document, &"domain".into(), &JsValue::from_str(domain))
                .map_err(|e| store_error(e, "document.domain"))?;
        }

        let iframe = document
            .create_element("iframe")
            .map_err(|e| store_error(e, "createElement"))?
            .dyn_into::<HtmlIFrameElement>()
            .map_err(|_| StoreError::Host("iframe element".to_string()))?;
        iframe.set_src(src);

        let script = document.get_elements_by_tag_name("script").item(0);
        let parent = script.as_ref().and_then(|script| script.parent_node());
        match (parent, script) {
            (Some(parent), Some(script)) => {
                let script: &Node = &script;
                parent
                    .insert_before(&iframe, Some(script))
                    .map_err(|e| store_error(e, "insertBefore"))?;
            }
            _ => {
                let body = document
                    .body()
                    .ok_or_else(|| StoreError::DocumentUnavailable("document.body".to_string()))?;
                body.append_child(&iframe)
                    .map_err(|e| store_error(e, "appendChild"))?;
            }
        }

        Ok(Self { iframe })
    }

    fn storage(&self) -> Option<JsValue> {
        let window = self.iframe.content_window()?;
        js_sys::Reflect::get(&window, &"storage".into())
            .ok()
            .filter(|storage| storage.is_object())
    }
}

impl HandshakeFrame for HandshakeIframe {
    fn is_ready(&self) -> bool {
        self.storage().is_some()
    }

    fn read(&self, key: &str) -> Option<String> {
        let storage = self.storage()?;
        match call_method(&storage, "get", &[JsValue::from_str(key)]) {
            Ok(value) => value.as_string(),
            Err(e) => {
                log::debug!("identity: handshake read failed, {}", e);
                None
            }
        }
    }
}
