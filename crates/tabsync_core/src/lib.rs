//! # Tabsync Core
//!
//! The synchronization cache between an external tabular store and a
//! remote object graph.
//!
//! The two systems of record disagree on identity: the tabular store
//! names records by `(table keyword, positional index)`, while the object
//! graph names the same logical entities by an opaque, stable application
//! id. This crate provides:
//!
//! - A multi-index in-memory record store with a generational
//!   previous/latest lifecycle for change detection
//! - An index allocator with provisional reservations and a baseline
//!   snapshot for indices claimed outside this system's control
//! - The [`SyncCache`] façade composing both behind a single lock
//! - The identity-tag grammar and command text that carry remote identity
//!   through the tabular store's textual record format
//!
//! ## Key Invariants
//!
//! - At most one record per `(keyword, index)` is latest at any time
//! - An application id maps to at most one record chain per keyword
//! - A resolved index never collides with a committed or reserved one
//! - Every mutation updates the primary store and all secondary indices
//!   atomically under the façade lock

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod cache;
mod collection;
mod config;
mod error;
mod keyword;
mod object;
mod pair_map;
mod record;
mod types;
pub mod wire;

pub use allocator::IndexAllocator;
pub use cache::SyncCache;
pub use collection::{RecordCollection, UpsertOutcome};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use keyword::{AliasTable, Keyword};
pub use object::{GraphObject, SharedObject};
pub use pair_map::PairMap;
pub use record::{normalize_payload, payload_fingerprint, CacheRecord, CommandKind, Fingerprint};
pub use types::{AppId, RecordIndex, StreamId};
