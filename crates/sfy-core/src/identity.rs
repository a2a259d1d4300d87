//! Global id resolution
//!
//! The global id comes from a first-party cookie when the browser lets us
//! read it. Otherwise a frame on the id-owning domain is embedded and polled
//! until it exposes its storage, for a bounded time. Expiry of that bound is
//! terminal and silent: the visit is simply not recorded.

use crate::config::ToolkitConfig;
use crate::cookie::{CookieDocument, Cookies};

/// The embedded handshake frame.
pub trait HandshakeFrame {
    /// Whether the frame has loaded and exposes its storage.
    fn is_ready(&self) -> bool;

    /// Read a value from the frame's storage.
    fn read(&self, key: &str) -> Option<String>;
}

/// Where the resolution stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveState {
    Waiting,
    Resolved(String),
    /// The frame never became ready in time.
    TimedOut,
    /// The frame answered without a usable id.
    Empty,
}

impl ResolveState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

/// Polling state machine for the identity handshake.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    key: String,
    poll_interval_ms: u64,
    timeout_ms: u64,
    started_at: i64,
    state: ResolveState,
}

impl IdentityResolver {
    pub fn new(key: &str, poll_interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            key: key.to_string(),
            poll_interval_ms,
            timeout_ms,
            started_at: 0,
            state: ResolveState::Waiting,
        }
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self::new(
            &config.identity_key,
            config.poll_interval_ms,
            config.handshake_timeout_ms,
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn state(&self) -> &ResolveState {
        &self.state
    }

    pub fn identity(&self) -> Option<&str> {
        match &self.state {
            ResolveState::Resolved(id) => Some(id),
            _ => None,
        }
    }

    /// Start resolving at `now`. A non-empty cookie value resolves at once;
    /// otherwise the caller embeds the frame and starts ticking.
    pub fn start(&mut self, cookie_value: Option<String>, now: i64) -> &ResolveState {
        self.started_at = now;
        self.state = match cookie_value.filter(|v| !v.is_empty()) {
            Some(id) => ResolveState::Resolved(id),
            None => ResolveState::Waiting,
        };
        &self.state
    }

    /// One polling tick. Terminal states never change.
    pub fn tick(&mut self, now: i64, frame: &dyn HandshakeFrame) -> &ResolveState {
        if self.state.is_terminal() {
            return &self.state;
        }

        if now.saturating_sub(self.started_at) >= self.timeout_ms as i64 {
            log::debug!("identity: handshake timed out after {}ms", self.timeout_ms);
            self.state = ResolveState::TimedOut;
            return &self.state;
        }

        if frame.is_ready() {
            self.state = match frame.read(&self.key) {
                Some(id) if !id.is_empty() && id != "null" => ResolveState::Resolved(id),
                _ => ResolveState::Empty,
            };
        }
        &self.state
    }
}

/// Read the global id from the first-party cookie.
pub fn read_identity_cookie(doc: &dyn CookieDocument, key: &str) -> Option<String> {
    match Cookies::new(doc).get(key) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("identity: cookie read failed, {}", e);
            None
        }
    }
}

/// Source of the handshake frame, cache-busted with `now`.
pub fn handshake_src(handshake_url: &str, now: i64) -> String {
    format!("{}?{}", handshake_url, now)
}
