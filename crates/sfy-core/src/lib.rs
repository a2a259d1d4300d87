//! sfy retargeting toolkit core
//!
//! Host-independent half of the toolkit. Everything that touches the browser
//! (localStorage, `document.cookie`, the userData behaviour element, image
//! beacons, frames) is reached through the small traits defined here, so the
//! same code runs under wasm and in native tests.
//!
//! # Modules
//!
//! - `hash`: string hash and radix-36 ids
//! - `domain`: registrable-domain split against a fixed suffix list
//! - `url`: URL slicing, `encodeURIComponent` and top-page URL resolution
//! - `cookie`: cookie key validation and `document.cookie` codec
//! - `event`: page event subscription
//! - `storage`: key/value store with inline expiry over three adapters
//! - `history`: visit history payload codec
//! - `visit`: visit key derivation and the deduplicator
//! - `identity`: global id handshake state machine
//! - `beacon`: beacon URL building and the sender trait
//! - `clock`: time and randomness source
//! - `config`: toolkit configuration
//! - `error`: error types

pub mod beacon;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod domain;
pub mod error;
pub mod event;
pub mod hash;
pub mod history;
pub mod identity;
pub mod storage;
pub mod url;
pub mod visit;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use beacon::BeaconSender;
pub use clock::{Clock, SystemClock};
pub use config::ToolkitConfig;
pub use error::{ConfigError, StoreError, UrlError};
pub use hash::hash;
pub use identity::{IdentityResolver, ResolveState};
pub use storage::{AdapterKind, Capabilities, KeyValueStore, Media};
pub use visit::{SkipReason, VisitDeduplicator, VisitKey, VisitOutcome, VisitRequest};
