//! Filter Group Model
//!
//! A query descriptor: an ordered collection of filter groups, each a
//! group id plus the filter ids in that group. A query matches objects
//! tagged with ANY filter of a group, for EVERY group.
//!
//! # Invariants
//!
//! - Group ids are unique within a model
//! - Adding filters to an existing group merges them (no duplicates,
//!   first-insertion order kept)

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{IndexError, IndexResult};

/// One named group of filter ids.
///
/// Groups compare equal when their ids are equal, whatever filters they hold.
#[derive(Debug, Clone)]
pub struct FilterGroup {
    id: String,
    filters: Vec<String>,
}

impl FilterGroup {
    fn new(id: String) -> Self {
        Self {
            id,
            filters: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn contains(&self, filter: &str) -> bool {
        self.filters.iter().any(|f| f == filter)
    }

    fn merge<I>(&mut self, filters: I)
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        for filter in filters {
            let filter = filter.to_string();
            if !self.contains(&filter) {
                self.filters.push(filter);
            }
        }
    }
}

impl PartialEq for FilterGroup {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FilterGroup {}

/// Ordered, keyed collection of filter groups.
#[derive(Debug, Clone, Default)]
pub struct FilterGroupModel {
    groups: Vec<FilterGroup>,
}

impl FilterGroupModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds filters to `group_id`, creating the group if needed.
    ///
    /// Filters already in the group are skipped.
    pub fn add_filters<I>(&mut self, group_id: impl Into<String>, filters: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let group_id = group_id.into();
        let position = match self.groups.iter().position(|g| g.id == group_id) {
            Some(pos) => pos,
            None => {
                self.groups.push(FilterGroup::new(group_id));
                self.groups.len() - 1
            }
        };
        self.groups[position].merge(filters);
        self
    }

    /// Builder form of `add_filters`
    pub fn with_group<I>(mut self, group_id: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.add_filters(group_id, filters);
        self
    }

    pub fn get(&self, group_id: &str) -> Option<&FilterGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn contains_group(&self, group_id: &str) -> bool {
        self.get(group_id).is_some()
    }

    /// Number of groups, including groups with no filters
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, FilterGroup> {
        self.groups.iter()
    }

    /// Groups that hold at least one filter; only these constrain a query
    pub fn non_empty_groups(&self) -> impl Iterator<Item = &FilterGroup> {
        self.groups.iter().filter(|g| !g.is_empty())
    }

    /// Fails with `InvalidQueryModel` unless some group holds a filter
    pub fn require_non_empty(&self) -> IndexResult<()> {
        if self.non_empty_groups().next().is_none() {
            return Err(IndexError::InvalidQueryModel(format!(
                "model has {} group(s) and no filter ids",
                self.groups.len()
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FilterGroupModel {
    type Item = &'a FilterGroup;
    type IntoIter = std::slice::Iter<'a, FilterGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl Serialize for FilterGroupModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.id, &group.filters)?;
        }
        map.end()
    }
}

/// JSON filter ids may be strings or integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum FilterToken {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl fmt::Display for FilterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterToken::Text(s) => f.write_str(s),
            FilterToken::Signed(n) => write!(f, "{}", n),
            FilterToken::Unsigned(n) => write!(f, "{}", n),
        }
    }
}

struct ModelVisitor;

impl<'de> Visitor<'de> for ModelVisitor {
    type Value = FilterGroupModel;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of group id to a list of filter ids")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut model = FilterGroupModel::new();
        // Entries are visited in document order
        while let Some((group_id, filters)) = access.next_entry::<String, Vec<FilterToken>>()? {
            model.add_filters(group_id, filters);
        }
        Ok(model)
    }
}

impl<'de> Deserialize<'de> for FilterGroupModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ModelVisitor)
    }
}
