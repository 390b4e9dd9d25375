//! Physical key layout of an index group
//!
//! ```text
//! {ns}:idx:{index}:global        global set of an index
//! {ns}:idx:{index}:f:{filter}    filter set of an index
//! {ns}:cat:{index}               key catalog of an index (catalog discovery)
//! {ns}:tmp:{token}               temporary union key
//! ```
//!
//! Namespaces and index names never contain `:`, so the pattern
//! `{ns}:idx:{index}:*` matches the keys of exactly one index. Filter ids
//! are the key tail and may contain anything.

use std::fmt;

use uuid::Uuid;

use super::errors::{IndexError, IndexResult};
use crate::store::GlobPattern;

/// Separator between key segments
pub const KEY_SEPARATOR: char = ':';

const GLOBAL_TOKEN: &str = "global";

/// Checks that a namespace or index name is usable as a key segment
pub fn validate_name(name: &str) -> IndexResult<()> {
    if name.is_empty() {
        return Err(IndexError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty",
        });
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(IndexError::InvalidName {
            name: name.to_string(),
            reason: "name must not contain ':'",
        });
    }
    Ok(())
}

/// Derives every physical key of one index group namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> IndexResult<Self> {
        let namespace = namespace.into();
        validate_name(&namespace)?;
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn global_key(&self, index: &str) -> String {
        format!("{}:idx:{}:{}", self.namespace, index, GLOBAL_TOKEN)
    }

    pub fn filter_key(&self, index: &str, filter: &str) -> String {
        format!("{}:idx:{}:f:{}", self.namespace, index, filter)
    }

    pub fn catalog_key(&self, index: &str) -> String {
        format!("{}:cat:{}", self.namespace, index)
    }

    /// Glob matching every global and filter key of `index`
    pub fn index_pattern(&self, index: &str) -> String {
        format!(
            "{}:idx:{}:*",
            GlobPattern::escape(&self.namespace),
            GlobPattern::escape(index)
        )
    }

    /// Glob matching every key of the namespace
    pub fn group_pattern(&self) -> String {
        format!("{}:*", GlobPattern::escape(&self.namespace))
    }

    /// Allocates a fresh temporary key in this namespace
    pub fn temporary_key(&self) -> TemporaryKey {
        TemporaryKey::new(&self.namespace)
    }
}

/// A randomly named key holding an intermediate union.
///
/// The token is a v4 UUID under the `tmp` segment, so it cannot collide
/// with an index or filter key. A temporary key is created and deleted
/// inside the same atomic batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporaryKey {
    key: String,
}

impl TemporaryKey {
    fn new(namespace: &str) -> Self {
        Self {
            key: format!("{}:tmp:{}", namespace, Uuid::new_v4().simple()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for TemporaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<TemporaryKey> for String {
    fn from(key: TemporaryKey) -> Self {
        key.key
    }
}
