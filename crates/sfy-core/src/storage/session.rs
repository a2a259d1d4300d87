//! Keys stored without an expiry
//!
//! Such keys live only for the browsing session and are removed when the
//! page unloads.

use std::collections::BTreeSet;

/// Set of session-scoped keys owned by one store.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    keys: BTreeSet<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str) {
        if !self.keys.contains(key) {
            self.keys.insert(key.to_string());
        }
    }

    pub fn unregister(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Take every key, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.keys).into_iter().collect()
    }
}
