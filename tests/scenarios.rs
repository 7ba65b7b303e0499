//! End-to-end scenarios S1-S6, exercising `Registry`/`CollectionHandle`
//! against the in-memory fakes the way an application would.

use std::collections::BTreeMap;
use std::time::Duration;

use cacheback::schema::SchemaBuilder;
use cacheback::testing::{InMemoryCacheStore, InMemoryOriginStore};
use cacheback::{DocValue, Registry};

fn tags_schema() -> cacheback::CollectionSchema {
    SchemaBuilder::new("tags")
        .primary_key("uid")
        .set_field("file_ids")
        .list_field("events")
        .zset_field("scores", "uid", "isStar")
        .scalar_field("haslog")
        .scalar_field("test")
        .build()
        .unwrap()
}

async fn seeded_registry() -> Registry<InMemoryCacheStore, InMemoryOriginStore> {
    let mut registry = Registry::new(InMemoryCacheStore::new(), InMemoryOriginStore::new());
    registry.register(tags_schema());
    registry
}

#[tokio::test]
async fn s1_set_round_trip_on_miss() {
    let registry = seeded_registry().await;
    let mut doc = BTreeMap::new();
    doc.insert(
        "file_ids".to_string(),
        DocValue::Array(vec!["1", "2", "3", "4"].into_iter().map(|s| DocValue::Str(s.to_string())).collect()),
    );
    registry.origin().seed("tags", "1", doc).await;

    let handle = registry.bind("tags", "1").unwrap();
    let mut members = handle.set_members("file_ids").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn s2_structured_field_replace_marks_dirty() {
    let registry = seeded_registry().await;
    let handle = registry.bind("tags", "1").unwrap();

    let values = DocValue::Array(vec!["1", "2", "3"].into_iter().map(|s| DocValue::Str(s.to_string())).collect());
    handle.set_structured("file_ids", values).await.unwrap();

    assert_eq!(handle.set_card("file_ids").await.unwrap(), 3);
    assert!(registry.cache().set_is_member(cacheback::index::KEYS_MODIFIED, "tags:1.file_ids").await.unwrap());
    assert!(registry.cache().zset_score(cacheback::index::LRU_QUEUE, "tags:1.file_ids").await.unwrap().is_some());
}

#[tokio::test]
async fn s3_list_operations_preserve_push_order() {
    let registry = seeded_registry().await;
    let handle = registry.bind("tags", "1").unwrap();

    handle.list_push_right("events", &["a".to_string()]).await.unwrap();
    handle.list_push_right("events", &["b".to_string(), "c".to_string()]).await.unwrap();
    handle.list_push_right("events", &["d".to_string()]).await.unwrap();

    let all = handle.list_range("events", 0, -1).await.unwrap();
    assert_eq!(all, vec!["a", "b", "c", "d"]);

    let empty = handle.list_range("events", 0, -5).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn s4_zset_ordering_by_ascending_score() {
    let registry = seeded_registry().await;
    let handle = registry.bind("tags", "1").unwrap();

    use cacheback::ZsetRecord;
    handle
        .zset_add(
            "scores",
            &[
                ZsetRecord { member: "1".to_string(), score: 5.0 },
                ZsetRecord { member: "2".to_string(), score: 0.0 },
                ZsetRecord { member: "3".to_string(), score: 1.0 },
                ZsetRecord { member: "4".to_string(), score: 0.0 },
            ],
        )
        .await
        .unwrap();

    let ordered = handle.zset_range("scores", 0, -1).await.unwrap();
    let scores: Vec<f64> = ordered.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![0.0, 0.0, 1.0, 5.0]);
}

#[tokio::test]
async fn s5_null_scalar_writes_through_without_marking_dirty() {
    let registry = seeded_registry().await;
    let mut doc = BTreeMap::new();
    doc.insert("haslog".to_string(), DocValue::Str("1".to_string()));
    doc.insert("test".to_string(), DocValue::Str("xyz".to_string()));
    registry.origin().seed("tags", "1", doc).await;

    let handle = registry.bind("tags", "1").unwrap();
    // Touch "haslog" first so the hash is materialised in cache.
    assert_eq!(handle.get_scalar("haslog").await.unwrap().as_deref(), Some("1"));

    handle.set_scalar("test", None).await.unwrap();

    assert_eq!(handle.get_scalar("test").await.unwrap(), None);
    assert!(!registry.cache().set_is_member(cacheback::index::KEYS_MODIFIED, "tags:1").await.unwrap());

    let origin_doc = registry
        .origin()
        .find_one("tags", "uid", "1", &[])
        .await
        .unwrap()
        .unwrap();
    let object = origin_doc.as_object().unwrap();
    assert_eq!(object.get("test"), Some(&DocValue::Null));
}

#[tokio::test]
async fn primary_key_typed_uses_the_schema_declared_codec() {
    use cacheback::{DocValue as Dv, Int64KeyCodec};
    use std::sync::Arc;

    let mut registry = Registry::new(InMemoryCacheStore::new(), InMemoryOriginStore::new());
    registry.register(
        SchemaBuilder::new("counters")
            .primary_key("id")
            .primary_key_codec(Arc::new(Int64KeyCodec))
            .scalar_field("value")
            .build()
            .unwrap(),
    );

    let handle = registry.bind("counters", "42").unwrap();
    assert_eq!(handle.primary_key_typed(), Dv::I64(42));
}

#[tokio::test]
async fn s6_scheduler_flush_under_contention() {
    use cacheback::scheduler::FlushScheduler;
    use std::sync::Arc;

    let cache = Arc::new(InMemoryCacheStore::new());
    let origin = Arc::new(InMemoryOriginStore::new());

    let handle_cache = cache.clone();
    let handle_origin = origin.clone();

    handle_cache.hash_set("users:1", "name", "ada").await.unwrap();
    cacheback::index::DirtyIndex::new(handle_cache.as_ref()).mark("users:1").await.unwrap();
    cacheback::index::LruIndex::new(handle_cache.as_ref()).touch("users:1").await.unwrap();

    let config = cacheback::config::SchedulerConfig {
        lease_ttl: Duration::from_millis(50),
        ..Default::default()
    };
    let scheduler = FlushScheduler::new(cache.clone(), origin.clone(), config, Arc::new(BTreeMap::new()));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(scheduler.try_flush_and_evict("users:1").await);

    let dirty = cacheback::index::DirtyIndex::new(cache.as_ref());
    assert!(!dirty.is_dirty("users:1").await.unwrap());

    let origin_doc = handle_origin.find_one("users", "uid", "1", &[]).await.unwrap().unwrap();
    assert_eq!(origin_doc.as_object().unwrap().get("name"), Some(&DocValue::Str("ada".to_string())));
}
