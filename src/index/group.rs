//! Filtered Object Index Group
//!
//! A named set of indexes sharing one key namespace. Each index owns a
//! global set of every object added to it and one filter set per filter
//! id used with it.
//!
//! # API
//!
//! - `add_index(name)` / `has_index(name)` / `indexes()`
//! - `add_object_to_index(index, object, filters)`
//! - `remove_object_from_index(index, object)`
//! - `remove_object_from_all_indexes(object)`
//! - `move_object_to_index(index, object, filters)`
//! - `get_objects_in_index(index, model)`
//! - `flush_index(index)` / `flush_all_indexes()`
//!
//! # Invariants
//!
//! - Every mutation touching more than one key is one atomic batch
//! - Every add writes the global set in the same batch as its filter sets
//! - Temporary keys are created and deleted inside the batch that uses them
//! - Store failures are returned unchanged; nothing is retried

use std::collections::BTreeSet;
use std::sync::Arc;

use super::errors::{IndexError, IndexResult};
use super::filter_model::FilterGroupModel;
use super::keys::KeySpace;
use super::plan::QueryPlan;
use super::registry::IndexRegistry;
use crate::config::{IndexGroupConfig, KeyDiscovery};
use crate::observability::{log_event, Event, Logger, MetricsRegistry, MetricsSnapshot, ObservationScope};
use crate::store::{BackingStore, Batch, Reply, StoreError, StoreResult};

/// Reverse index from filter ids to object ids over a shared backing store.
pub struct IndexGroup<S: BackingStore + ?Sized> {
    store: Arc<S>,
    keys: KeySpace,
    registry: IndexRegistry,
    scan_page_size: usize,
    key_discovery: KeyDiscovery,
    metrics: MetricsRegistry,
}

impl<S: BackingStore + ?Sized> IndexGroup<S> {
    /// Creates a group from configuration, registering the configured indexes.
    ///
    /// A `scan_page_size` of 0 is treated as 1.
    pub fn new(store: Arc<S>, config: &IndexGroupConfig) -> IndexResult<Self> {
        let keys = KeySpace::new(config.namespace.clone())?;
        let registry = IndexRegistry::from_names(config.indexes.iter().cloned())?;

        let count = registry.len().to_string();
        log_event(
            Event::GroupCreated,
            &[("namespace", keys.namespace()), ("indexes", count.as_str())],
        );

        Ok(Self {
            store,
            keys,
            registry,
            scan_page_size: config.scan_page_size.max(1),
            key_discovery: config.key_discovery,
            metrics: MetricsRegistry::new(),
        })
    }

    /// Creates a group with default settings and no registered index
    pub fn with_namespace(store: Arc<S>, namespace: &str) -> IndexResult<Self> {
        Self::new(store, &IndexGroupConfig::new(namespace))
    }

    pub fn namespace(&self) -> &str {
        self.keys.namespace()
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    pub fn key_discovery(&self) -> KeyDiscovery {
        self.key_discovery
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // Registry

    /// Registers an index. Registering an existing name is a no-op.
    pub fn add_index(&mut self, name: &str) -> IndexResult<()> {
        if self.registry.register(name)? {
            log_event(
                Event::IndexRegistered,
                &[("namespace", self.keys.namespace()), ("index", name)],
            );
        }
        Ok(())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Registered index names in registration order
    pub fn indexes(&self) -> &[String] {
        self.registry.list()
    }

    // Mutations

    /// Adds `object_id` to the global set of `index` and to the filter set
    /// of every id in `filters`, atomically.
    ///
    /// Returns true if any set did not already hold the object.
    pub fn add_object_to_index<I>(&self, index: &str, object_id: &str, filters: I) -> IndexResult<bool>
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.registry.require(index)?;
        let filters = collect_filters(filters);

        let mut batch = self.store.begin_batch();
        let positions = self.queue_add(&mut batch, index, object_id, &filters);
        let replies = self.execute(batch)?;

        let changed = any_true(&replies, &positions)?;
        if changed {
            self.metrics.increment_objects_added();
        }
        log_event(
            Event::ObjectAdded,
            &[
                ("index", index),
                ("object", object_id),
                ("changed", bool_str(changed)),
            ],
        );
        Ok(changed)
    }

    /// Removes `object_id` from every set of `index`, atomically.
    ///
    /// Returns true if any set held the object.
    pub fn remove_object_from_index(&self, index: &str, object_id: &str) -> IndexResult<bool> {
        self.registry.require(index)?;

        let mut batch = self.store.begin_batch();
        let removal = self.queue_remove(&mut batch, index, object_id);
        let replies = self.execute(batch)?;

        let removed = removal.had_effect(&replies)?;
        if removed {
            self.metrics.increment_objects_removed();
        }
        log_event(
            Event::ObjectRemoved,
            &[
                ("index", index),
                ("object", object_id),
                ("removed", bool_str(removed)),
            ],
        );
        Ok(removed)
    }

    /// Removes `object_id` from every set of every registered index, atomically.
    ///
    /// Returns the indexes whose global set held the object, in
    /// registration order.
    pub fn remove_object_from_all_indexes(&self, object_id: &str) -> IndexResult<Vec<String>> {
        let mut batch = self.store.begin_batch();
        let removals = self.queue_remove_everywhere(&mut batch, object_id);
        let replies = self.execute(batch)?;

        let removed_from = removed_indexes(&replies, &removals)?;
        if !removed_from.is_empty() {
            self.metrics.increment_objects_removed();
        }
        if Logger::enabled(Event::ObjectRemovedFromAll.severity()) {
            let joined = removed_from.join(",");
            log_event(
                Event::ObjectRemovedFromAll,
                &[("object", object_id), ("removed_from", joined.as_str())],
            );
        }
        Ok(removed_from)
    }

    /// Removes `object_id` from every index and adds it to `index` with
    /// `filters`, as one atomic batch.
    ///
    /// Returns the indexes the object was removed from, as
    /// `remove_object_from_all_indexes` does.
    pub fn move_object_to_index<I>(&self, index: &str, object_id: &str, filters: I) -> IndexResult<Vec<String>>
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.registry.require(index)?;
        let filters = collect_filters(filters);

        let mut batch = self.store.begin_batch();
        let removals = self.queue_remove_everywhere(&mut batch, object_id);
        self.queue_add(&mut batch, index, object_id, &filters);
        let replies = self.execute(batch)?;

        let removed_from = removed_indexes(&replies, &removals)?;
        self.metrics.increment_objects_moved();
        if Logger::enabled(Event::ObjectMoved.severity()) {
            let joined = removed_from.join(",");
            log_event(
                Event::ObjectMoved,
                &[("index", index), ("object", object_id), ("removed_from", joined.as_str())],
            );
        }
        Ok(removed_from)
    }

    // Queries

    /// Objects of `index` matching `model`: any filter within a group,
    /// every group across the model.
    ///
    /// Without a model, or with a model holding no filter id, returns every
    /// object of the index.
    pub fn get_objects_in_index(
        &self,
        index: &str,
        model: Option<&FilterGroupModel>,
    ) -> IndexResult<BTreeSet<String>> {
        self.registry.require(index)?;
        let plan = QueryPlan::build(&self.keys, index, model);
        self.run_query(index, plan)
    }

    /// Like `get_objects_in_index`, but the model must hold at least one
    /// filter id; otherwise fails with `InvalidQueryModel`.
    pub fn get_objects_matching(&self, index: &str, model: &FilterGroupModel) -> IndexResult<BTreeSet<String>> {
        self.registry.require(index)?;
        let plan = match QueryPlan::for_filters(&self.keys, index, model) {
            Ok(plan) => plan,
            Err(e) => {
                self.metrics.increment_queries_rejected();
                log_event(Event::QueryRejected, &[("index", index), ("reason", e.to_string().as_str())]);
                return Err(e);
            }
        };
        self.run_query(index, plan)
    }

    /// Whether `object_id` is in the global set of `index`
    pub fn is_object_in_index(&self, index: &str, object_id: &str) -> IndexResult<bool> {
        self.registry.require(index)?;
        self.track(self.store.set_is_member(&self.keys.global_key(index), object_id))
    }

    /// Physical keys currently holding data for `index`, global key first
    pub fn index_keys(&self, index: &str) -> IndexResult<Vec<String>> {
        self.registry.require(index)?;
        self.discover_keys(index)
    }

    // Flush

    /// Deletes every physical key of `index`. The name stays registered.
    ///
    /// Returns the number of keys deleted.
    pub fn flush_index(&self, index: &str) -> IndexResult<usize> {
        self.registry.require(index)?;
        let scope = ObservationScope::with_fields(
            Event::IndexFlush.as_str(),
            &[("namespace", self.keys.namespace()), ("index", index)],
        );

        match self.flush_keys(index).and_then(|keys| self.delete_keys(keys)) {
            Ok(deleted) => {
                scope.complete(&[("keys", deleted.to_string().as_str())]);
                Ok(deleted)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Deletes every physical key of the group namespace.
    ///
    /// With catalog discovery only keys of registered indexes are found.
    pub fn flush_all_indexes(&self) -> IndexResult<usize> {
        let scope = ObservationScope::with_fields(
            Event::GroupFlush.as_str(),
            &[("namespace", self.keys.namespace())],
        );

        let keys = match self.key_discovery {
            KeyDiscovery::Scan => self.track(self.store.keys_matching(&self.keys.group_pattern())),
            KeyDiscovery::Catalog => self.registered_flush_keys(),
        };

        match keys.and_then(|keys| self.delete_keys(keys)) {
            Ok(deleted) => {
                scope.complete(&[("keys", deleted.to_string().as_str())]);
                Ok(deleted)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    // Internals

    fn execute(&self, batch: Batch) -> IndexResult<Vec<Reply>> {
        let replies = self.track(self.store.execute_batch(batch))?;
        self.metrics.increment_batches();
        Ok(replies)
    }

    /// Counts and logs store failures, then hands them back unchanged
    fn track<T>(&self, result: StoreResult<T>) -> IndexResult<T> {
        result.map_err(|e| {
            self.metrics.increment_store_failures();
            log_event(
                Event::StoreUnavailable,
                &[
                    ("namespace", self.keys.namespace()),
                    ("code", e.code()),
                    ("reason", e.to_string().as_str()),
                ],
            );
            IndexError::Store(e)
        })
    }

    /// Queues the adds for one object; returns the reply positions of the
    /// global and filter adds.
    fn queue_add(&self, batch: &mut Batch, index: &str, object_id: &str, filters: &[String]) -> Vec<usize> {
        let global = self.keys.global_key(index);
        let filter_keys: Vec<String> = filters.iter().map(|f| self.keys.filter_key(index, f)).collect();

        let mut positions = Vec::with_capacity(filter_keys.len() + 1);
        positions.push(batch.set_add(global.clone(), object_id));
        for key in &filter_keys {
            positions.push(batch.set_add(key.clone(), object_id));
        }

        if self.key_discovery == KeyDiscovery::Catalog {
            let catalog = self.keys.catalog_key(index);
            batch.set_add(catalog.clone(), global);
            for key in filter_keys {
                batch.set_add(catalog.clone(), key);
            }
        }

        positions
    }

    /// Queues the removals for one index. The filter keys are resolved by
    /// the store when the batch runs, so a filter set created after this
    /// call is still covered.
    fn queue_remove(&self, batch: &mut Batch, index: &str, object_id: &str) -> Removal {
        let global = batch.set_remove(self.keys.global_key(index), object_id);
        let others = match self.key_discovery {
            KeyDiscovery::Scan => batch.set_remove_matching(self.keys.index_pattern(index), object_id),
            KeyDiscovery::Catalog => batch.set_remove_listed(self.keys.catalog_key(index), object_id),
        };
        Removal {
            index: index.to_string(),
            global,
            others,
        }
    }

    fn queue_remove_everywhere(&self, batch: &mut Batch, object_id: &str) -> Vec<Removal> {
        self.registry
            .list()
            .iter()
            .map(|index| self.queue_remove(batch, index, object_id))
            .collect()
    }

    /// Keys of one index holding object ids. The global key comes first and
    /// is always present, even when the store holds no such key.
    fn discover_keys(&self, index: &str) -> IndexResult<Vec<String>> {
        let global = self.keys.global_key(index);
        let found = match self.key_discovery {
            KeyDiscovery::Scan => self.track(self.store.keys_matching(&self.keys.index_pattern(index)))?,
            KeyDiscovery::Catalog => self
                .track(self.store.set_members(&self.keys.catalog_key(index)))?
                .into_iter()
                .collect(),
        };

        let mut keys = Vec::with_capacity(found.len() + 1);
        keys.push(global.clone());
        keys.extend(found.into_iter().filter(|k| *k != global));
        Ok(keys)
    }

    fn flush_keys(&self, index: &str) -> IndexResult<Vec<String>> {
        let mut keys = self.discover_keys(index)?;
        if self.key_discovery == KeyDiscovery::Catalog {
            keys.push(self.keys.catalog_key(index));
        }
        Ok(keys)
    }

    fn registered_flush_keys(&self) -> IndexResult<Vec<String>> {
        let mut keys = Vec::new();
        for index in self.registry.list() {
            keys.extend(self.flush_keys(index)?);
        }
        Ok(keys)
    }

    fn delete_keys(&self, keys: Vec<String>) -> IndexResult<usize> {
        let deleted = self.track(self.store.delete(&keys))?;
        self.metrics.add_keys_flushed(deleted as u64);
        Ok(deleted)
    }

    fn run_query(&self, index: &str, plan: QueryPlan) -> IndexResult<BTreeSet<String>> {
        let kind = plan.kind();
        let objects = match plan {
            QueryPlan::All { global } => self.scan_all(&global)?,
            QueryPlan::Single { key } => self.track(self.store.set_members(&key))?,
            QueryPlan::Union { keys } => self.track(self.store.set_union(&keys))?,
            QueryPlan::Intersect { direct, unions } if unions.is_empty() => {
                self.track(self.store.set_intersect(&direct))?
            }
            QueryPlan::Intersect { direct, unions } => {
                let mut batch = self.store.begin_batch();
                let mut operands = direct;
                let mut temporary = Vec::with_capacity(unions.len());
                for (tmp, keys) in unions {
                    let tmp: String = tmp.into();
                    batch.set_union_store(tmp.clone(), keys);
                    operands.push(tmp.clone());
                    temporary.push(tmp);
                }
                let created = temporary.len() as u64;
                let result = batch.set_intersect(operands);
                batch.delete(temporary);

                let replies = self.execute(batch)?;
                self.metrics.add_temporary_keys(created);
                members_at(replies, result)?
            }
        };

        self.metrics.increment_queries_executed();
        if Logger::enabled(Event::QueryExecuted.severity()) {
            let count = objects.len().to_string();
            log_event(
                Event::QueryExecuted,
                &[("index", index), ("plan", kind), ("results", count.as_str())],
            );
        }
        Ok(objects)
    }

    /// Enumerates a set page by page
    fn scan_all(&self, key: &str) -> IndexResult<BTreeSet<String>> {
        let mut objects = BTreeSet::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.track(self.store.scan_members(key, cursor.as_deref(), self.scan_page_size))?;
            objects.extend(page.members);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(objects),
            }
        }
    }
}

/// Reply positions of one index's removals inside a batch
struct Removal {
    index: String,
    global: usize,
    others: usize,
}

impl Removal {
    fn had_effect(&self, replies: &[Reply]) -> IndexResult<bool> {
        Ok(bool_at(replies, self.global)? || count_at(replies, self.others)? > 0)
    }
}

fn collect_filters<I>(filters: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: ToString,
{
    filters.into_iter().map(|f| f.to_string()).collect()
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn bool_at(replies: &[Reply], position: usize) -> IndexResult<bool> {
    match replies.get(position) {
        Some(Reply::Bool(b)) => Ok(*b),
        Some(other) => Err(StoreError::UnexpectedReply {
            expected: "bool",
            actual: other.kind(),
        }
        .into()),
        None => Err(StoreError::UnexpectedReply {
            expected: "bool",
            actual: "none",
        }
        .into()),
    }
}

fn count_at(replies: &[Reply], position: usize) -> IndexResult<usize> {
    match replies.get(position) {
        Some(Reply::Count(n)) => Ok(*n),
        Some(other) => Err(StoreError::UnexpectedReply {
            expected: "count",
            actual: other.kind(),
        }
        .into()),
        None => Err(StoreError::UnexpectedReply {
            expected: "count",
            actual: "none",
        }
        .into()),
    }
}

fn any_true(replies: &[Reply], positions: &[usize]) -> IndexResult<bool> {
    let mut any = false;
    for &position in positions {
        any |= bool_at(replies, position)?;
    }
    Ok(any)
}

/// The global-set removal decides whether an object was in an index
fn removed_indexes(replies: &[Reply], removals: &[Removal]) -> IndexResult<Vec<String>> {
    let mut removed = Vec::new();
    for removal in removals {
        if bool_at(replies, removal.global)? {
            removed.push(removal.index.clone());
        }
    }
    Ok(removed)
}

fn members_at(replies: Vec<Reply>, position: usize) -> IndexResult<BTreeSet<String>> {
    let reply = replies.into_iter().nth(position).ok_or(StoreError::UnexpectedReply {
        expected: "members",
        actual: "none",
    })?;
    Ok(reply.into_members()?)
}
