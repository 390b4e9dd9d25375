//! Filtered object index subsystem for facetdex
//!
//! Reverse indexes from filter ids to object ids, kept in a set-oriented
//! backing store. The store holds only identifiers, never object records.
//!
//! # Design Principles
//!
//! - Union within a filter group, intersection across groups
//! - One atomic batch per multi-key mutation
//! - Index names live in an explicit registry owned by one group
//!
//! # Invariants
//!
//! - An object in any filter set of an index is in that index's global set
//! - Key patterns of one index match no key of another index
//! - Temporary keys never outlive the batch that created them

mod errors;
mod filter_model;
mod group;
mod keys;
mod plan;
mod registry;

pub use errors::{IndexError, IndexResult};
pub use filter_model::{FilterGroup, FilterGroupModel};
pub use group::IndexGroup;
pub use keys::{validate_name, KeySpace, TemporaryKey, KEY_SEPARATOR};
pub use plan::QueryPlan;
pub use registry::IndexRegistry;
