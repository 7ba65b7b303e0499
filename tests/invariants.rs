//! Quantified invariants from spec.md §8, checked with `proptest` where
//! the property holds over an arbitrary sequence of operations, and as
//! direct scenario tests where the property is about one interaction
//! (null write-through, round-trip, eviction survival already covered
//! in `scenarios.rs`).

use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;

use cacheback::schema::SchemaBuilder;
use cacheback::testing::{InMemoryCacheStore, InMemoryOriginStore};
use cacheback::Registry;

fn schema() -> cacheback::CollectionSchema {
    SchemaBuilder::new("widgets")
        .primary_key("uid")
        .set_field("members")
        .build()
        .unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<String>),
    Remove(Vec<String>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec("[a-d]", 1..4).prop_map(Op::Add),
        prop::collection::vec("[a-d]", 1..4).prop_map(Op::Remove),
    ]
}

proptest! {
    /// Invariant 1 (dirty ⇒ present) and invariant 2 (present ⇒ LRU):
    /// after any sequence of set mutations, every key in `modified`
    /// still exists in the cache, and every key that exists in the
    /// cache is present in the LRU queue.
    #[test]
    fn dirty_implies_present_and_present_implies_lru(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let mut registry = Registry::new(InMemoryCacheStore::new(), InMemoryOriginStore::new());
            registry.register(schema());
            let handle = registry.bind("widgets", "1").unwrap();

            for op in ops {
                match op {
                    Op::Add(members) => { handle.set_add("members", &members).await.unwrap(); }
                    Op::Remove(members) => { handle.set_remove("members", &members).await.unwrap(); }
                }
            }

            let cache = registry.cache();
            let modified = cacheback::index::DirtyIndex::new(cache).all().await.unwrap();
            for key in &modified {
                prop_assert!(cache.exists(key).await.unwrap(), "dirty key {key} missing from cache");
            }

            let key = "widgets:1.members";
            if cache.exists(key).await.unwrap() {
                let score = cache.zset_score(cacheback::index::LRU_QUEUE, key).await.unwrap();
                prop_assert!(score.is_some(), "present key {key} missing from LRU queue");
            }
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn invariant_4_flush_idempotence_on_non_dirty_evicted_key() {
    use cacheback::scheduler::FlushScheduler;
    use std::sync::Arc;

    let cache = Arc::new(InMemoryCacheStore::new());
    let origin = Arc::new(InMemoryOriginStore::new());
    cache.hash_set("widgets:1", "name", "thing").await.unwrap();
    cacheback::index::LruIndex::new(cache.as_ref()).touch("widgets:1").await.unwrap();

    let scheduler = FlushScheduler::new(cache.clone(), origin, Default::default(), Arc::new(std::collections::BTreeMap::new()));
    assert!(scheduler.try_flush_and_evict("widgets:1").await);
    // Key is gone; a second attempt must be a no-op, not an error.
    assert!(!scheduler.try_flush_and_evict("widgets:1").await);
}

#[tokio::test]
async fn invariant_7_isolation_under_lease() {
    use cacheback::lease::LeaseManager;
    use cacheback::scheduler::FlushScheduler;
    use std::sync::Arc;

    let cache = Arc::new(InMemoryCacheStore::new());
    let origin = Arc::new(InMemoryOriginStore::new());
    cache.hash_set("widgets:1", "name", "thing").await.unwrap();
    cacheback::index::LruIndex::new(cache.as_ref()).touch("widgets:1").await.unwrap();

    let config = cacheback::config::SchedulerConfig { lease_ttl: Duration::from_secs(5), ..Default::default() };
    let scheduler = FlushScheduler::new(cache.clone(), origin, config, Arc::new(std::collections::BTreeMap::new()));

    let lease = LeaseManager::with_ttl(cache.as_ref(), Duration::from_secs(5));
    let _held = lease.try_acquire("widgets:1").await.unwrap().expect("lease free");

    assert!(!scheduler.try_flush_and_evict("widgets:1").await);
}

#[tokio::test]
async fn invariant_5_round_trip_for_every_structured_shape() {
    use cacheback::DocValue;
    use cacheback::ZsetRecord;

    let mut registry = Registry::new(InMemoryCacheStore::new(), InMemoryOriginStore::new());
    registry.register(
        SchemaBuilder::new("widgets")
            .primary_key("uid")
            .set_field("tags")
            .list_field("events")
            .zset_field("scores", "m", "s")
            .build()
            .unwrap(),
    );
    let handle = registry.bind("widgets", "1").unwrap();

    handle
        .set_structured(
            "tags",
            DocValue::Array(vec!["x", "y", "x"].into_iter().map(|s| DocValue::Str(s.to_string())).collect()),
        )
        .await
        .unwrap();
    let members: BTreeSet<String> = handle.set_members("tags").await.unwrap().into_iter().collect();
    assert_eq!(members, BTreeSet::from(["x".to_string(), "y".to_string()]));

    handle
        .set_structured(
            "events",
            DocValue::Array(vec!["1", "2", "3"].into_iter().map(|s| DocValue::Str(s.to_string())).collect()),
        )
        .await
        .unwrap();
    assert_eq!(handle.list_range("events", 0, -1).await.unwrap(), vec!["1", "2", "3"]);

    handle
        .zset_add(
            "scores",
            &[
                ZsetRecord { member: "a".to_string(), score: 2.0 },
                ZsetRecord { member: "b".to_string(), score: 1.0 },
            ],
        )
        .await
        .unwrap();
    let ordered = handle.zset_range("scores", 0, -1).await.unwrap();
    assert_eq!(ordered[0].member, "b");
    assert_eq!(ordered[1].member, "a");
}

#[tokio::test]
async fn invariant_6_no_loss_across_eviction() {
    use cacheback::scheduler::FlushScheduler;
    use std::sync::Arc;

    let cache = Arc::new(InMemoryCacheStore::new());
    let origin = Arc::new(InMemoryOriginStore::new());

    cache.hash_set("widgets:1", "name", "x").await.unwrap();
    cacheback::index::DirtyIndex::new(cache.as_ref()).mark("widgets:1").await.unwrap();
    cacheback::index::LruIndex::new(cache.as_ref()).touch("widgets:1").await.unwrap();

    let scheduler = FlushScheduler::new(cache.clone(), origin.clone(), Default::default(), Arc::new(std::collections::BTreeMap::new()));
    assert!(scheduler.try_flush_and_evict("widgets:1").await);

    let found = origin.find_one("widgets", "uid", "1", &[]).await.unwrap().unwrap();
    assert_eq!(
        found.as_object().unwrap().get("name"),
        Some(&cacheback::DocValue::Str("x".to_string()))
    );
}

#[tokio::test]
async fn invariant_5_find_decodes_nested_set_and_list_members_and_named_zset_records() {
    use cacheback::DocValue;
    use cacheback::ZsetRecord;

    let mut registry = Registry::new(InMemoryCacheStore::new(), InMemoryOriginStore::new());
    registry.register(
        SchemaBuilder::new("widgets")
            .primary_key("uid")
            .set_field("tags")
            .zset_field("scores", "m", "s")
            .build()
            .unwrap(),
    );
    let handle = registry.bind("widgets", "1").unwrap();

    // A Set member that is itself a nested object must decode back to
    // the same `DocValue::Object`, not a raw JSON string.
    let mut nested = std::collections::BTreeMap::new();
    nested.insert("k".to_string(), DocValue::I64(9));
    handle
        .set_structured("tags", DocValue::Array(vec![DocValue::Object(nested.clone())]))
        .await
        .unwrap();

    let found = handle.find(Some(&["tags"])).await.unwrap();
    let DocValue::Array(items) = found.get("tags").unwrap().clone().unwrap() else { panic!("expected array") };
    assert_eq!(items, vec![DocValue::Object(nested)]);

    // A zset record must read back keyed by the schema's declared
    // member/score field names, not a "member:score" string.
    handle
        .zset_add("scores", &[ZsetRecord { member: "7".to_string(), score: 3.5 }])
        .await
        .unwrap();
    let found = handle.find(Some(&["scores"])).await.unwrap();
    let DocValue::Array(records) = found.get("scores").unwrap().clone().unwrap() else { panic!("expected array") };
    let record = records[0].as_object().unwrap();
    assert_eq!(record.get("m"), Some(&DocValue::I64(7)));
    assert_eq!(record.get("s"), Some(&DocValue::F64(3.5)));
}
