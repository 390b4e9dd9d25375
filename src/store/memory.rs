//! In-process backing store
//!
//! Holds every set in one `BTreeMap` behind a mutex. A batch runs under a
//! single lock acquisition, which gives the all-or-nothing, isolated
//! execution the index layer depends on.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::batch::{Batch, Command, Reply};
use super::errors::{StoreError, StoreResult};
use super::glob::GlobPattern;
use super::{BackingStore, ScanPage};

type SetMap = BTreeMap<String, BTreeSet<String>>;
type Patterns = BTreeMap<String, GlobPattern>;

/// Thread-safe in-memory set store.
#[derive(Debug)]
pub struct MemoryStore {
    sets: Mutex<SetMap>,
    available: AtomicBool,
    batches_executed: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty, available store
    pub fn new() -> Self {
        Self {
            sets: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            batches_executed: AtomicU64::new(0),
        }
    }

    /// Simulates losing (`false`) or regaining (`true`) the connection.
    ///
    /// While unavailable every call fails with `StoreError::Unavailable`
    /// and no state changes.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of batches executed successfully
    pub fn batches_executed(&self) -> u64 {
        self.batches_executed.load(Ordering::Relaxed)
    }

    /// All existing keys, sorted
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, SetMap>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        self.sets
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn apply(sets: &mut SetMap, patterns: &Patterns, command: Command) -> Reply {
        match command {
            Command::SetAdd { key, member } => {
                Reply::Bool(sets.entry(key).or_default().insert(member))
            }
            Command::SetRemove { key, member } => {
                let Some(set) = sets.get_mut(&key) else {
                    return Reply::Bool(false);
                };
                let removed = set.remove(&member);
                if set.is_empty() {
                    sets.remove(&key);
                }
                Reply::Bool(removed)
            }
            Command::SetRemoveMatching { pattern, member } => {
                let targets: Vec<String> = match patterns.get(&pattern) {
                    Some(glob) => sets.keys().filter(|k| glob.matches(k)).cloned().collect(),
                    None => Vec::new(),
                };
                Reply::Count(remove_from(sets, &targets, &member))
            }
            Command::SetRemoveListed { list, member } => {
                let targets: Vec<String> = sets
                    .get(&list)
                    .map(|listed| listed.iter().cloned().collect())
                    .unwrap_or_default();
                Reply::Count(remove_from(sets, &targets, &member))
            }
            Command::SetIsMember { key, member } => {
                Reply::Bool(sets.get(&key).is_some_and(|s| s.contains(&member)))
            }
            Command::SetMembers { key } => Reply::Members(sets.get(&key).cloned().unwrap_or_default()),
            Command::SetUnion { keys } => Reply::Members(union(sets, &keys)),
            Command::SetUnionStore { dest, keys } => {
                let result = union(sets, &keys);
                let len = result.len();
                if result.is_empty() {
                    sets.remove(&dest);
                } else {
                    sets.insert(dest, result);
                }
                Reply::Count(len)
            }
            Command::SetIntersect { keys } => Reply::Members(intersect(sets, &keys)),
            Command::Delete { keys } => {
                let deleted = keys.iter().filter(|k| sets.remove(*k).is_some()).count();
                Reply::Count(deleted)
            }
        }
    }
}

/// Compiles every pattern of a batch up front so a bad pattern rejects
/// the batch before any command applies.
fn compile_patterns(commands: &[Command]) -> StoreResult<Patterns> {
    let mut patterns = Patterns::new();
    for command in commands {
        if let Command::SetRemoveMatching { pattern, .. } = command {
            if !patterns.contains_key(pattern) {
                patterns.insert(pattern.clone(), GlobPattern::new(pattern)?);
            }
        }
    }
    Ok(patterns)
}

/// Removes `member` from each target set, dropping sets left empty.
/// Returns how many sets held the member.
fn remove_from(sets: &mut SetMap, targets: &[String], member: &str) -> usize {
    let mut removed = 0;
    for key in targets {
        let Some(set) = sets.get_mut(key) else {
            continue;
        };
        if set.remove(member) {
            removed += 1;
        }
        if set.is_empty() {
            sets.remove(key);
        }
    }
    removed
}

fn union(sets: &SetMap, keys: &[String]) -> BTreeSet<String> {
    keys.iter()
        .filter_map(|k| sets.get(k))
        .flat_map(|s| s.iter().cloned())
        .collect()
}

fn intersect(sets: &SetMap, keys: &[String]) -> BTreeSet<String> {
    let mut operands = Vec::with_capacity(keys.len());
    for key in keys {
        match sets.get(key) {
            Some(set) => operands.push(set),
            // A missing key is the empty set
            None => return BTreeSet::new(),
        }
    }
    operands.sort_by_key(|s| s.len());

    let Some((smallest, rest)) = operands.split_first() else {
        return BTreeSet::new();
    };
    smallest
        .iter()
        .filter(|m| rest.iter().all(|s| s.contains(*m)))
        .cloned()
        .collect()
}

impl BackingStore for MemoryStore {
    fn execute_batch(&self, batch: Batch) -> StoreResult<Vec<Reply>> {
        let commands = batch.into_commands();
        let patterns = compile_patterns(&commands)?;
        let mut sets = self.lock()?;
        let replies = commands
            .into_iter()
            .map(|command| Self::apply(&mut sets, &patterns, command))
            .collect();
        self.batches_executed.fetch_add(1, Ordering::Relaxed);
        Ok(replies)
    }

    fn scan_members(&self, key: &str, cursor: Option<&str>, count: usize) -> StoreResult<ScanPage> {
        let sets = self.lock()?;
        let Some(set) = sets.get(key) else {
            return Ok(ScanPage::default());
        };

        let lower = match cursor {
            Some(c) => Bound::Excluded(c.to_string()),
            None => Bound::Unbounded,
        };
        let mut range = set.range((lower, Bound::Unbounded));
        let members: Vec<String> = range.by_ref().take(count.max(1)).cloned().collect();
        let next_cursor = match range.next() {
            Some(_) => members.last().cloned(),
            None => None,
        };

        Ok(ScanPage {
            members,
            next_cursor,
        })
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let glob = GlobPattern::new(pattern)?;
        let sets = self.lock()?;
        Ok(sets.keys().filter(|k| glob.matches(k)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_reports_change_once() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "a").unwrap());
        assert!(!store.set_add("s", "a").unwrap());
        assert!(store.set_is_member("s", "a").unwrap());
    }

    #[test]
    fn test_removing_last_member_deletes_key() {
        let store = MemoryStore::new();
        store.set_add("s", "a").unwrap();
        assert!(store.set_remove("s", "a").unwrap());
        assert!(!store.set_remove("s", "a").unwrap());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_union_and_intersection() {
        let store = MemoryStore::new();
        store.set_add("a", "1").unwrap();
        store.set_add("a", "2").unwrap();
        store.set_add("b", "2").unwrap();
        store.set_add("b", "3").unwrap();

        let union = store.set_union(&keys(&["a", "b", "missing"])).unwrap();
        assert_eq!(union.into_iter().collect::<Vec<_>>(), vec!["1", "2", "3"]);

        let inter = store.set_intersect(&keys(&["a", "b"])).unwrap();
        assert_eq!(inter.into_iter().collect::<Vec<_>>(), vec!["2"]);

        assert!(store.set_intersect(&keys(&["a", "missing"])).unwrap().is_empty());
    }

    #[test]
    fn test_union_store_of_empty_sets_leaves_no_key() {
        let store = MemoryStore::new();
        assert_eq!(store.set_union_store("dest", &keys(&["x", "y"])).unwrap(), 0);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_batch_replies_in_order() {
        let store = MemoryStore::new();
        let mut batch = store.begin_batch();
        batch.set_add("a", "1");
        batch.set_add("a", "1");
        batch.set_union_store("tmp", keys(&["a"]));
        batch.set_intersect(keys(&["a", "tmp"]));
        batch.delete(keys(&["tmp"]));

        let replies = store.execute_batch(batch).unwrap();
        assert_eq!(replies[0], Reply::Bool(true));
        assert_eq!(replies[1], Reply::Bool(false));
        assert_eq!(replies[2], Reply::Count(1));
        assert_eq!(replies[3], Reply::Members(["1".to_string()].into_iter().collect()));
        assert_eq!(replies[4], Reply::Count(1));
        assert_eq!(store.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_offline_store_rejects_batches_without_effect() {
        let store = MemoryStore::new();
        store.set_available(false);

        let mut batch = store.begin_batch();
        batch.set_add("a", "1");
        let err = store.execute_batch(batch).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_available(true);
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(store.batches_executed(), 0);
    }

    #[test]
    fn test_scan_pages_cover_all_members() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.set_add("big", &format!("m{:02}", i)).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        let mut calls = 0;
        loop {
            let page = store.scan_members("big", cursor.as_deref(), 10).unwrap();
            calls += 1;
            assert!(page.members.len() <= 10);
            seen.extend(page.members);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(calls, 3);
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_remove_matching_resolves_keys_at_execution() {
        let store = MemoryStore::new();
        store.set_add("ns:idx:a:global", "o").unwrap();

        let mut batch = store.begin_batch();
        batch.set_remove_matching("ns:idx:a:*", "o");

        // Key written after the batch was built but before it runs
        store.set_add("ns:idx:a:f:late", "o").unwrap();
        store.set_add("ns:idx:a:f:late", "other").unwrap();
        store.set_add("ns:idx:ab:global", "o").unwrap();

        let replies = store.execute_batch(batch).unwrap();
        assert_eq!(replies, vec![Reply::Count(2)]);
        assert_eq!(store.keys().unwrap(), vec!["ns:idx:a:f:late", "ns:idx:ab:global"]);
        assert!(!store.set_is_member("ns:idx:a:f:late", "o").unwrap());
    }

    #[test]
    fn test_remove_listed_follows_list_at_execution() {
        let store = MemoryStore::new();
        store.set_add("cat", "k1").unwrap();
        store.set_add("k1", "o").unwrap();

        let mut batch = store.begin_batch();
        batch.set_remove_listed("cat", "o");

        store.set_add("cat", "k2").unwrap();
        store.set_add("k2", "o").unwrap();
        store.set_add("k3", "o").unwrap();

        let replies = store.execute_batch(batch).unwrap();
        assert_eq!(replies, vec![Reply::Count(2)]);
        assert_eq!(store.keys().unwrap(), vec!["cat", "k3"]);
    }

    #[test]
    fn test_bad_pattern_rejects_whole_batch() {
        let store = MemoryStore::new();
        let mut batch = store.begin_batch();
        batch.set_add("a", "1");
        batch.set_remove_matching("[unclosed", "1");

        let err = store.execute_batch(batch).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPattern { .. }));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_keys_matching_glob() {
        let store = MemoryStore::new();
        store.set_add("ns:idx:a:global", "1").unwrap();
        store.set_add("ns:idx:a:f:x", "1").unwrap();
        store.set_add("ns:idx:ab:global", "1").unwrap();

        let found = store.keys_matching("ns:idx:a:*").unwrap();
        assert_eq!(found, vec!["ns:idx:a:f:x", "ns:idx:a:global"]);
    }
}
