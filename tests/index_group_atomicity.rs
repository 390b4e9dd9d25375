//! Index Group Atomicity Tests
//!
//! Tests for store-level guarantees the index group relies on:
//! - Store failures propagate unchanged and leave no partial state
//! - Concurrent mutations from many threads all land
//! - Groups sharing one store stay isolated by namespace
//! - Catalog key discovery behaves like scan discovery

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use facetdex::index::FilterGroupModel;
use facetdex::{BackingStore, IndexError, IndexGroup, IndexGroupConfig, KeyDiscovery, MemoryStore, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_with(discovery: KeyDiscovery, indexes: &[&str]) -> (Arc<MemoryStore>, IndexGroup<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = IndexGroupConfig::new("app")
        .with_indexes(indexes.iter().copied())
        .with_key_discovery(discovery);
    let group = IndexGroup::new(Arc::clone(&store), &config).unwrap();
    (store, group)
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Members of filter sets of `index` that are missing from its global set
fn orphaned_members(store: &MemoryStore, index: &str) -> Vec<String> {
    let global = store.set_members(&format!("app:idx:{}:global", index)).unwrap();
    let mut orphans = Vec::new();
    for key in store.keys_matching(&format!("app:idx:{}:f:*", index)).unwrap() {
        for member in store.set_members(&key).unwrap() {
            if !global.contains(&member) {
                orphans.push(format!("{} in {}", member, key));
            }
        }
    }
    orphans
}

// =============================================================================
// Failure Propagation Tests
// =============================================================================

/// An offline store surfaces as a retryable store error.
#[test]
fn test_store_unavailable_propagates() {
    let (store, group) = setup_with(KeyDiscovery::Scan, &["tasks"]);
    group.add_object_to_index("tasks", "T1", ["f1"]).unwrap();

    store.set_available(false);

    let err = group.get_objects_in_index("tasks", None).unwrap_err();
    assert!(matches!(err, IndexError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert!(group.move_object_to_index("tasks", "T1", ["f2"]).is_err());
    assert!(group.flush_all_indexes().is_err());

    store.set_available(true);

    // Nothing from the failed calls reached the store
    let f1 = FilterGroupModel::new().with_group("g", ["f1"]);
    assert_eq!(group.get_objects_in_index("tasks", Some(&f1)).unwrap(), set(&["T1"]));
    assert_eq!(group.index_keys("tasks").unwrap().len(), 2);
    assert!(group.metrics().store_failures >= 3);
}

/// A failed multi-group query leaves no temporary key behind.
#[test]
fn test_failed_query_leaves_no_temporary_keys() {
    let (store, group) = setup_with(KeyDiscovery::Scan, &["tasks"]);
    group.add_object_to_index("tasks", "T1", ["a", "x"]).unwrap();

    store.set_available(false);
    let model = FilterGroupModel::new()
        .with_group("g1", ["a", "b"])
        .with_group("g2", ["x", "y"]);
    assert!(group.get_objects_in_index("tasks", Some(&model)).is_err());
    store.set_available(true);

    assert!(store.keys_matching("app:tmp:*").unwrap().is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

/// Concurrent adds from several threads are all visible afterwards.
#[test]
fn test_concurrent_adds() {
    let (_store, group) = setup_with(KeyDiscovery::Scan, &["tasks"]);
    let group = Arc::new(group);

    let mut handles = vec![];
    for t in 0..8 {
        let group = Arc::clone(&group);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let filter = if i % 2 == 0 { "even" } else { "odd" };
                group
                    .add_object_to_index("tasks", &format!("T{}-{}", t, i), [filter])
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(group.get_objects_in_index("tasks", None).unwrap().len(), 200);
    let even = FilterGroupModel::new().with_group("parity", ["even"]);
    assert_eq!(group.get_objects_in_index("tasks", Some(&even)).unwrap().len(), 104);
    assert_eq!(group.metrics().objects_added, 200);
}

/// Concurrent moves of one object never leave it in two indexes or none.
#[test]
fn test_concurrent_moves_keep_one_home() {
    let (_store, group) = setup_with(KeyDiscovery::Scan, &["a", "b"]);
    group.add_object_to_index("a", "obj", ["f"]).unwrap();
    let group = Arc::new(group);

    let mut handles = vec![];
    for t in 0..4 {
        let group = Arc::clone(&group);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let target = if (t + i) % 2 == 0 { "a" } else { "b" };
                group.move_object_to_index(target, "obj", ["f"]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let in_a = group.is_object_in_index("a", "obj").unwrap();
    let in_b = group.is_object_in_index("b", "obj").unwrap();
    assert!(in_a ^ in_b, "object must live in exactly one index");
}

/// Racing moves never leave an object in a filter set of an index whose
/// global set does not hold it.
#[test]
fn test_concurrent_moves_keep_filter_sets_within_global() {
    for discovery in [KeyDiscovery::Scan, KeyDiscovery::Catalog] {
        for _round in 0..50 {
            let (store, group) = setup_with(discovery, &["a", "b"]);
            let group = Arc::new(group);

            let mut handles = vec![];
            for t in 0..4 {
                let group = Arc::clone(&group);
                handles.push(thread::spawn(move || {
                    for i in 0..20 {
                        if (t + i) % 2 == 0 {
                            group.move_object_to_index("a", "obj", ["fa"]).unwrap();
                        } else {
                            group.move_object_to_index("b", "obj", ["fb"]).unwrap();
                        }
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(orphaned_members(&store, "a"), Vec::<String>::new());
            assert_eq!(orphaned_members(&store, "b"), Vec::<String>::new());

            let fb = FilterGroupModel::new().with_group("g", ["fb"]);
            let in_b = group.is_object_in_index("b", "obj").unwrap();
            assert_eq!(group.get_objects_in_index("b", Some(&fb)).unwrap().is_empty(), !in_b);
        }
    }
}

/// Two groups on one store do not see each other's objects.
#[test]
fn test_namespaces_isolate_groups() {
    let store = Arc::new(MemoryStore::new());
    let left = IndexGroup::new(
        Arc::clone(&store),
        &IndexGroupConfig::new("left").with_indexes(["tasks"]),
    )
    .unwrap();
    let right = IndexGroup::new(
        Arc::clone(&store),
        &IndexGroupConfig::new("right").with_indexes(["tasks"]),
    )
    .unwrap();

    left.add_object_to_index("tasks", "L1", ["f"]).unwrap();
    right.add_object_to_index("tasks", "R1", ["f"]).unwrap();

    assert_eq!(left.get_objects_in_index("tasks", None).unwrap(), set(&["L1"]));
    assert_eq!(right.remove_object_from_all_indexes("L1").unwrap(), Vec::<String>::new());
    assert_eq!(left.flush_all_indexes().unwrap(), 2);
    assert_eq!(right.get_objects_in_index("tasks", None).unwrap(), set(&["R1"]));
}

/// A group can run over a type-erased store.
#[test]
fn test_dyn_store() {
    let store: Arc<dyn BackingStore> = Arc::new(MemoryStore::new());
    let mut group = IndexGroup::with_namespace(store, "dyn").unwrap();
    group.add_index("tasks").unwrap();

    group.add_object_to_index("tasks", "T1", ["f"]).unwrap();
    assert_eq!(group.get_objects_in_index("tasks", None).unwrap(), set(&["T1"]));
}

// =============================================================================
// Catalog Discovery Tests
// =============================================================================

/// Catalog discovery answers removal, move and query like scan discovery.
#[test]
fn test_catalog_mode_parity() {
    for discovery in [KeyDiscovery::Scan, KeyDiscovery::Catalog] {
        let (_store, group) = setup_with(discovery, &["tasks", "done"]);

        group.add_object_to_index("tasks", "T1", ["urgent", "east"]).unwrap();
        group.add_object_to_index("tasks", "T2", ["east"]).unwrap();

        let model = FilterGroupModel::new()
            .with_group("priority", ["urgent"])
            .with_group("region", ["east"]);
        assert_eq!(group.get_objects_in_index("tasks", Some(&model)).unwrap(), set(&["T1"]));

        assert_eq!(group.move_object_to_index("done", "T1", ["east"]).unwrap(), vec!["tasks"]);
        assert!(group.get_objects_in_index("tasks", Some(&model)).unwrap().is_empty());

        assert!(group.remove_object_from_index("tasks", "T2").unwrap());
        assert!(group.get_objects_in_index("tasks", None).unwrap().is_empty());
    }
}

/// Catalog flush removes data keys and the catalog itself.
#[test]
fn test_catalog_flush_removes_catalog() {
    let (store, group) = setup_with(KeyDiscovery::Catalog, &["tasks", "done"]);

    group.add_object_to_index("tasks", "T1", ["f1", "f2"]).unwrap();
    group.add_object_to_index("done", "T2", ["f1"]).unwrap();

    assert_eq!(group.index_keys("tasks").unwrap().len(), 3);
    // global + 2 filters + catalog
    assert_eq!(group.flush_index("tasks").unwrap(), 4);
    assert!(store.keys_matching("app:*:tasks*").unwrap().is_empty());

    // global + 1 filter + catalog
    assert_eq!(group.flush_all_indexes().unwrap(), 3);
    assert!(store.keys().unwrap().is_empty());
}
