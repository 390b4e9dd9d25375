//! Index name registry owned by one index group.

use super::errors::{IndexError, IndexResult};
use super::keys::validate_name;

/// Registered index names, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRegistry {
    names: Vec<String>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a configured list; duplicates collapse.
    pub fn from_names<I>(names: I) -> IndexResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name)?;
        }
        Ok(registry)
    }

    /// Registers `name`. Returns false when it was already registered.
    pub fn register(&mut self, name: impl Into<String>) -> IndexResult<bool> {
        let name = name.into();
        validate_name(&name)?;
        if self.contains(&name) {
            return Ok(false);
        }
        self.names.push(name);
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn list(&self) -> &[String] {
        &self.names
    }

    /// Fails with `UnknownIndex` unless `name` is registered
    pub fn require(&self, name: &str) -> IndexResult<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(IndexError::UnknownIndex(name.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
