//! facetdex - filtered object index groups
//!
//! Answers "which objects currently match this combination of filters"
//! from reverse indexes kept in a set-oriented key/value store, without
//! scanning the primary data store.

pub mod config;
pub mod index;
pub mod observability;
pub mod store;

pub use config::{ConfigError, IndexGroupConfig, KeyDiscovery};
pub use index::{FilterGroupModel, IndexError, IndexGroup, IndexResult};
pub use store::{BackingStore, MemoryStore, StoreError};
