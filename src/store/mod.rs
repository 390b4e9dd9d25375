//! Backing store contract for facetdex
//!
//! The index layer talks to a remote key/value service through the
//! `BackingStore` trait. The service must offer set primitives, glob key
//! enumeration, paged member scans and an atomic batch mode.
//!
//! # Invariants
//!
//! - `execute_batch` applies every command as one unit, isolated from
//!   concurrent batches touching the same keys
//! - Replies are returned in command order
//! - Empty sets do not exist as keys
//! - `SetRemoveMatching` and `SetRemoveListed` resolve their target keys
//!   inside the batch, against the same state the other commands see

mod batch;
mod errors;
mod glob;
mod memory;

use std::collections::BTreeSet;

pub use batch::{Batch, Command, Reply};
pub use errors::{StoreError, StoreResult};
pub use glob::GlobPattern;
pub use memory::MemoryStore;

/// One page of a paged member enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Members returned by this call
    pub members: Vec<String>,
    /// Opaque cursor for the next call; `None` when the scan is complete
    pub next_cursor: Option<String>,
}

/// Trait for set-oriented key/value backends.
///
/// Implementations must be thread-safe (Send + Sync); one store may back
/// many index groups at once.
///
/// Single-command methods default to a one-command batch, so a backend
/// only has to implement `execute_batch`, `scan_members` and
/// `keys_matching`.
pub trait BackingStore: Send + Sync {
    /// Executes every command of `batch` atomically.
    ///
    /// Either all commands apply or none do. Returns one reply per command.
    fn execute_batch(&self, batch: Batch) -> StoreResult<Vec<Reply>>;

    /// Returns up to roughly `count` members of `key`, starting after
    /// `cursor` (`None` starts a new scan).
    ///
    /// Members present for the whole duration of a scan are returned at
    /// least once.
    fn scan_members(&self, key: &str, cursor: Option<&str>, count: usize) -> StoreResult<ScanPage>;

    /// Lists keys matching a Redis-style glob pattern.
    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Starts a new batch
    fn begin_batch(&self) -> Batch {
        Batch::new()
    }

    fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        single(self, Command::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
        })?
        .into_bool()
    }

    fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        single(self, Command::SetRemove {
            key: key.to_string(),
            member: member.to_string(),
        })?
        .into_bool()
    }

    fn set_is_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        single(self, Command::SetIsMember {
            key: key.to_string(),
            member: member.to_string(),
        })?
        .into_bool()
    }

    /// Reads a whole set in one call. Prefer `scan_members` for large sets.
    fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
        single(self, Command::SetMembers { key: key.to_string() })?.into_members()
    }

    fn set_union(&self, keys: &[String]) -> StoreResult<BTreeSet<String>> {
        single(self, Command::SetUnion { keys: keys.to_vec() })?.into_members()
    }

    /// Stores the union of `keys` at `dest`, returning its cardinality
    fn set_union_store(&self, dest: &str, keys: &[String]) -> StoreResult<usize> {
        single(self, Command::SetUnionStore {
            dest: dest.to_string(),
            keys: keys.to_vec(),
        })?
        .into_count()
    }

    fn set_intersect(&self, keys: &[String]) -> StoreResult<BTreeSet<String>> {
        single(self, Command::SetIntersect { keys: keys.to_vec() })?.into_members()
    }

    /// Deletes keys, returning how many existed
    fn delete(&self, keys: &[String]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        single(self, Command::Delete { keys: keys.to_vec() })?.into_count()
    }
}

fn single<S: BackingStore + ?Sized>(store: &S, command: Command) -> StoreResult<Reply> {
    let mut batch = store.begin_batch();
    batch.push(command);
    store
        .execute_batch(batch)?
        .into_iter()
        .next()
        .ok_or(StoreError::UnexpectedReply {
            expected: "one reply",
            actual: "none",
        })
}
