//! Query planning
//!
//! Turns an index name and an optional filter group model into the set
//! operations that answer it. Planning is pure; the group executes plans.
//!
//! - no model, or no group with filters: all members of the global set
//! - one group: union of its filter sets (a direct read for one filter)
//! - several groups: intersection across groups, where a group with
//!   several filters is first union-stored into a temporary key

use super::errors::IndexResult;
use super::filter_model::{FilterGroup, FilterGroupModel};
use super::keys::{KeySpace, TemporaryKey};

/// Set operations answering one membership query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Enumerate the global set
    All { global: String },
    /// Read one filter set
    Single { key: String },
    /// Union of filter sets
    Union { keys: Vec<String> },
    /// Intersection of `direct` keys and materialized unions
    Intersect {
        direct: Vec<String>,
        unions: Vec<(TemporaryKey, Vec<String>)>,
    },
}

impl QueryPlan {
    /// Plans a query; a missing or filterless model selects the whole index
    pub fn build(keys: &KeySpace, index: &str, model: Option<&FilterGroupModel>) -> Self {
        let groups: Vec<&FilterGroup> = model
            .map(|m| m.non_empty_groups().collect())
            .unwrap_or_default();
        if groups.is_empty() {
            return QueryPlan::All {
                global: keys.global_key(index),
            };
        }
        Self::plan_groups(keys, index, &groups)
    }

    /// Plans a filtered query. Fails with `InvalidQueryModel` when the
    /// model holds no filter id.
    pub fn for_filters(keys: &KeySpace, index: &str, model: &FilterGroupModel) -> IndexResult<Self> {
        model.require_non_empty()?;
        let groups: Vec<&FilterGroup> = model.non_empty_groups().collect();
        Ok(Self::plan_groups(keys, index, &groups))
    }

    fn plan_groups(keys: &KeySpace, index: &str, groups: &[&FilterGroup]) -> Self {
        let filter_keys = |group: &FilterGroup| -> Vec<String> {
            group.filters().iter().map(|f| keys.filter_key(index, f)).collect()
        };

        if let [group] = groups {
            let mut group_keys = filter_keys(*group);
            if group_keys.len() == 1 {
                return QueryPlan::Single {
                    key: group_keys.remove(0),
                };
            }
            return QueryPlan::Union { keys: group_keys };
        }

        let mut direct = Vec::new();
        let mut unions = Vec::new();
        for group in groups {
            let mut group_keys = filter_keys(*group);
            if group_keys.len() == 1 {
                direct.push(group_keys.remove(0));
            } else {
                unions.push((keys.temporary_key(), group_keys));
            }
        }
        QueryPlan::Intersect { direct, unions }
    }

    /// Temporary keys this plan creates while executing
    pub fn temporary_keys(&self) -> Vec<&TemporaryKey> {
        match self {
            QueryPlan::Intersect { unions, .. } => unions.iter().map(|(tmp, _)| tmp).collect(),
            _ => Vec::new(),
        }
    }

    /// Short plan name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            QueryPlan::All { .. } => "all",
            QueryPlan::Single { .. } => "single",
            QueryPlan::Union { .. } => "union",
            QueryPlan::Intersect { .. } => "intersect",
        }
    }
}
