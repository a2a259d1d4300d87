//! Page event subscription

/// Event fired when the page is about to unload.
pub const UNLOAD_EVENT: &str = "beforeunload";

/// Handle returned by [`EventTarget::on`], used to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// Attach/detach over the host's event system.
pub trait EventTarget {
    fn on(&self, event: &str, handler: Box<dyn FnMut()>) -> ListenerId;

    fn off(&self, event: &str, id: ListenerId);
}
