//! Flush scheduler (component H): calendar pass, carry-over pass, and
//! pressure pass, driving `try_flush_and_evict` — the system's
//! linearisation point. Grounded on the teacher's `JobScheduler::run`
//! loop (`src/scheduling/scheduler.rs`), generalised from a job queue to
//! an LRU-paged flush sweep.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::index::{DirtyIndex, LruIndex};
use crate::key::{lease_key, parse_key};
use crate::lease::LeaseManager;
use crate::schema::{CollectionSchema, FieldShape};
use crate::store::{CacheStore, OriginStore};

/// Owns the cache/origin handles the scheduler needs; constructed once
/// and driven by `run` in a dedicated `tokio::spawn`ed task (the crate
/// defines no cancellation primitive of its own — see spec.md §5 — so a
/// caller stops the loop by aborting that task's `JoinHandle`).
pub struct FlushScheduler<C: CacheStore, O: OriginStore> {
    cache: Arc<C>,
    origin: Arc<O>,
    config: SchedulerConfig,
    schemas: Arc<BTreeMap<String, CollectionSchema>>,
    last_completed_day: std::sync::atomic::AtomicI64,
    schedule_cursor: std::sync::atomic::AtomicUsize,
}

impl<C: CacheStore, O: OriginStore> FlushScheduler<C, O> {
    /// `schemas` lets the structured-field write-back branch dispatch by
    /// the field's actual declared `FieldShape` instead of guessing.
    /// Build it once via `Registry::schemas().clone()` and share it with
    /// `Arc`; a collection/field missing from the map is logged and
    /// skipped rather than guessed at.
    pub fn new(
        cache: Arc<C>,
        origin: Arc<O>,
        config: SchedulerConfig,
        schemas: Arc<BTreeMap<String, CollectionSchema>>,
    ) -> Self {
        Self {
            cache,
            origin,
            config,
            schemas,
            last_completed_day: std::sync::atomic::AtomicI64::new(-1),
            schedule_cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// The linearisation point of the system (spec.md §4.H). Returns
    /// `true` iff `k` was evicted (whether or not it was dirty);
    /// `false` means lease contention or a lost optimistic race — both
    /// ordinary, retry-next-pass outcomes, never an error.
    pub async fn try_flush_and_evict(&self, key: &str) -> bool {
        let lease = LeaseManager::with_ttl(self.cache.as_ref(), self.config.lease_ttl);
        let Ok(Some(held)) = lease.try_acquire(key).await else {
            return false;
        };

        let dirty = DirtyIndex::new(self.cache.as_ref());
        let was_dirty = match dirty.is_dirty(key).await {
            Ok(v) => v,
            Err(_) => return false,
        };

        if was_dirty {
            if let Ok(parsed) = parse_key(key) {
                if self.write_back_one(&parsed.collection, &parsed.primary_key, parsed.field.as_deref()).await.is_err() {
                    return false;
                }
            } else {
                warn!(key, "poison pill: unparseable key carried over without write-back");
            }
        }

        let lru = LruIndex::new(self.cache.as_ref());
        let then_delete: Vec<String> = if was_dirty {
            vec![crate::index::KEYS_MODIFIED.to_string()]
        } else {
            Vec::new()
        };
        // `try_compare_and_delete` is the WATCH/MULTI/EXEC linearisation
        // point (§4.H step 2): if the lease identifier we hold still
        // matches, it atomically deletes the key, removes it from
        // `modified` if dirty, and releases the lease. A concurrent
        // `announce` changes the lease value and aborts this commit.
        let mut victims = then_delete;
        victims.push(key.to_string());
        let committed = self
            .cache
            .try_compare_and_delete(&lease_key(key), held.holder(), &victims)
            .await
            .unwrap_or(false);

        if committed {
            let _ = lru.remove(key).await;
            if was_dirty {
                let _ = dirty.clear(key).await;
            }
            debug!(key, was_dirty, "flushed and evicted");
        }
        committed
    }

    async fn write_back_one(&self, collection: &str, pk: &str, field: Option<&str>) -> Result<(), crate::error::HandleError> {
        // The document case (`field: None`) writes the wire-level hash
        // straight through, same as `CollectionHandle::write_back`. The
        // structured case needs the field's declared `FieldShape` to know
        // which cache shape to read back and how to name a zset record's
        // member/score keys — `self.schemas` carries exactly the shapes
        // `Registry` validated at startup, without requiring a borrow of
        // `Registry` itself.
        let document_key = crate::key::document_key(collection, pk);
        match field {
            None => {
                let hash = self.cache.hash_get_all(&document_key).await.map_err(crate::error::HandleError::from)?;
                let mut patch = BTreeMap::new();
                for (field, wire) in hash {
                    patch.insert(field, crate::codec::DocValue::Str(wire));
                }
                self.origin
                    .update_set(collection, "", pk, crate::codec::DocValue::Object(patch))
                    .await
                    .map_err(crate::error::HandleError::from)?;
            }
            Some(field_name) => {
                let shape = self
                    .schemas
                    .get(collection)
                    .and_then(|schema| schema.field(field_name))
                    .and_then(|descriptor| descriptor.shape.clone());

                let Some(shape) = shape else {
                    warn!(collection, field_name, "write-back skipped: no declared shape for this field");
                    return Ok(());
                };

                let field_key = crate::key::field_key(collection, pk, field_name);
                let value = match &shape {
                    FieldShape::Set => {
                        let members = self.cache.set_members(&field_key).await.map_err(crate::error::HandleError::from)?;
                        crate::codec::DocValue::Array(members.iter().map(|m| crate::handle::wire_to_doc_value(m)).collect())
                    }
                    FieldShape::List => {
                        let members = self.cache.list_range(&field_key, 0, -1).await.map_err(crate::error::HandleError::from)?;
                        crate::codec::DocValue::Array(members.iter().map(|m| crate::handle::wire_to_doc_value(m)).collect())
                    }
                    FieldShape::Zset { member_name, score_name } => {
                        let pairs = self.cache.zset_range(&field_key, 0, -1).await.map_err(crate::error::HandleError::from)?;
                        crate::codec::DocValue::Array(
                            pairs
                                .into_iter()
                                .map(|(member, score)| crate::handle::zset_pair_to_doc_value(&member, score, member_name, score_name))
                                .collect(),
                        )
                    }
                };

                let mut patch = BTreeMap::new();
                patch.insert(field_name.to_string(), value);
                self.origin
                    .update_set(collection, "", pk, crate::codec::DocValue::Object(patch))
                    .await
                    .map_err(crate::error::HandleError::from)?;
            }
        }
        Ok(())
    }

    /// One iteration of the control loop (calendar + carry-over +
    /// pressure passes). `carry_over` accumulates keys a calendar pass
    /// failed to flush so the next call can retry them first.
    pub async fn tick(&self, carry_over: &mut VecDeque<String>) {
        self.calendar_pass(carry_over).await;
        self.carry_over_pass(carry_over).await;
        self.pressure_pass().await;
    }

    async fn calendar_pass(&self, carry_over: &mut VecDeque<String>) {
        if self.config.schedule.is_empty() {
            return;
        }

        let today = current_day_ordinal();
        if today <= self.last_completed_day.load(std::sync::atomic::Ordering::Relaxed) {
            return;
        }

        let cursor = self.schedule_cursor.load(std::sync::atomic::Ordering::Relaxed);
        let Some(entry) = self.config.schedule.get(cursor) else {
            // REDESIGN FLAG fix (spec.md §9 Open Questions): advance
            // only after a full cycle through the schedule, gated by
            // `last_completed_day`, never mid-entry.
            self.schedule_cursor.store(0, std::sync::atomic::Ordering::Relaxed);
            self.last_completed_day.store(today, std::sync::atomic::Ordering::Relaxed);
            return;
        };

        if !time_of_day_reached(entry.time_of_day) {
            return;
        }

        let lru = LruIndex::new(self.cache.as_ref());
        let page = lru.oldest(self.config.page_size).await.unwrap_or_default();
        let mut fully_flushed = true;
        for (key, _score) in page {
            if !entry_matches(&key, &entry.collections) {
                continue;
            }
            if !self.try_flush_and_evict(&key).await {
                carry_over.push_back(key);
                fully_flushed = false;
            }
        }

        if fully_flushed {
            self.schedule_cursor.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    async fn carry_over_pass(&self, carry_over: &mut VecDeque<String>) {
        let pending: Vec<String> = carry_over.drain(..).collect();
        for key in pending {
            if !self.try_flush_and_evict(&key).await {
                carry_over.push_back(key);
            }
        }
    }

    async fn pressure_pass(&self) {
        let lru = LruIndex::new(self.cache.as_ref());
        let Ok(count) = lru.len().await else { return };

        if count >= self.config.lru_high_watermark {
            let overflow = count - self.config.lru_low_watermark;
            let victims = lru.oldest(overflow).await.unwrap_or_default();
            for (key, _score) in victims {
                self.try_flush_and_evict(&key).await;
            }
        } else if count >= self.config.lru_low_watermark {
            tokio::time::sleep(self.config.flush_interval / 2).await;
        } else {
            tokio::time::sleep(self.config.flush_interval).await;
        }
    }

    /// Diverges, matching the original's `while True` control loop.
    /// Intended to be driven from a dedicated `tokio::spawn`ed task.
    pub async fn run(self: Arc<Self>) -> ! {
        let mut carry_over = VecDeque::new();
        info!("flush scheduler starting");
        loop {
            self.tick(&mut carry_over).await;
        }
    }
}

fn entry_matches(key: &str, collections: &[String]) -> bool {
    if collections.is_empty() {
        return true;
    }
    collections.iter().any(|c| key.starts_with(&format!("{c}:")))
}

fn time_of_day_reached(target: (u8, u8)) -> bool {
    use chrono::Timelike;
    let now = chrono::Utc::now();
    (now.hour() as u8, now.minute() as u8) >= target
}

fn current_day_ordinal() -> i64 {
    use chrono::Datelike;
    chrono::Utc::now().num_days_from_ce() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryCacheStore, InMemoryOriginStore};
    use std::time::Duration;

    #[tokio::test]
    async fn flush_idempotence_on_non_dirty_evicted_key() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let origin = Arc::new(InMemoryOriginStore::new());
        let config = SchedulerConfig { lease_ttl: Duration::from_millis(50), ..Default::default() };
        let scheduler = FlushScheduler::new(cache.clone(), origin, config, Arc::new(BTreeMap::new()));

        cache.hash_set("tags:1", "name", "widgets").await.unwrap();
        LruIndex::new(cache.as_ref()).touch("tags:1").await.unwrap();

        assert!(scheduler.try_flush_and_evict("tags:1").await);
        assert!(!scheduler.try_flush_and_evict("tags:1").await);
    }

    #[tokio::test]
    async fn isolation_under_lease_blocks_concurrent_flush() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let origin = Arc::new(InMemoryOriginStore::new());
        let config = SchedulerConfig { lease_ttl: Duration::from_secs(10), ..Default::default() };
        let scheduler = FlushScheduler::new(cache.clone(), origin, config, Arc::new(BTreeMap::new()));

        cache.hash_set("tags:1", "name", "widgets").await.unwrap();
        LruIndex::new(cache.as_ref()).touch("tags:1").await.unwrap();

        let lease = LeaseManager::new(cache.as_ref());
        let held = lease.try_acquire("tags:1").await.unwrap().expect("lease should be free");

        assert!(!scheduler.try_flush_and_evict("tags:1").await);

        lease.try_release(&held).await.unwrap();
        assert!(scheduler.try_flush_and_evict("tags:1").await);
    }

    fn tags_schema() -> crate::schema::CollectionSchema {
        crate::schema::SchemaBuilder::new("tags")
            .primary_key("uid")
            .set_field("file_ids")
            .list_field("events")
            .zset_field("scores", "uid", "isStar")
            .build()
            .unwrap()
    }

    fn schemas_with_tags() -> Arc<BTreeMap<String, crate::schema::CollectionSchema>> {
        let mut schemas = BTreeMap::new();
        schemas.insert("tags".to_string(), tags_schema());
        Arc::new(schemas)
    }

    #[tokio::test]
    async fn structured_write_back_respects_the_set_shape() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let origin = Arc::new(InMemoryOriginStore::new());
        let config = SchedulerConfig { lease_ttl: Duration::from_millis(50), ..Default::default() };
        let scheduler = FlushScheduler::new(cache.clone(), origin.clone(), config, schemas_with_tags());

        let key = "tags:1.file_ids";
        cache.set_add(key, &["a".to_string(), "b".to_string()]).await.unwrap();
        DirtyIndex::new(cache.as_ref()).mark(key).await.unwrap();
        LruIndex::new(cache.as_ref()).touch(key).await.unwrap();

        assert!(scheduler.try_flush_and_evict(key).await);

        let doc = origin.find_one("tags", "uid", "1", &[]).await.unwrap().unwrap();
        let field = doc.as_object().unwrap().get("file_ids").unwrap();
        let crate::codec::DocValue::Array(items) = field else { panic!("expected array") };
        let mut members: Vec<String> = items
            .iter()
            .map(|v| match v {
                crate::codec::DocValue::Str(s) => s.clone(),
                other => panic!("expected string member, got {other:?}"),
            })
            .collect();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn structured_write_back_respects_the_list_shape() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let origin = Arc::new(InMemoryOriginStore::new());
        let config = SchedulerConfig { lease_ttl: Duration::from_millis(50), ..Default::default() };
        let scheduler = FlushScheduler::new(cache.clone(), origin.clone(), config, schemas_with_tags());

        let key = "tags:1.events";
        cache.list_push_right(key, &["login".to_string(), "logout".to_string()]).await.unwrap();
        DirtyIndex::new(cache.as_ref()).mark(key).await.unwrap();
        LruIndex::new(cache.as_ref()).touch(key).await.unwrap();

        assert!(scheduler.try_flush_and_evict(key).await);

        let doc = origin.find_one("tags", "uid", "1", &[]).await.unwrap().unwrap();
        let field = doc.as_object().unwrap().get("events").unwrap();
        let crate::codec::DocValue::Array(items) = field else { panic!("expected array") };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], crate::codec::DocValue::Str("login".to_string()));
        assert_eq!(items[1], crate::codec::DocValue::Str("logout".to_string()));
    }

    #[tokio::test]
    async fn structured_write_back_builds_named_zset_records() {
        let cache = Arc::new(InMemoryCacheStore::new());
        let origin = Arc::new(InMemoryOriginStore::new());
        let config = SchedulerConfig { lease_ttl: Duration::from_millis(50), ..Default::default() };
        let scheduler = FlushScheduler::new(cache.clone(), origin.clone(), config, schemas_with_tags());

        let key = "tags:1.scores";
        cache.zset_add(key, &[(1.0, "42".to_string())]).await.unwrap();
        DirtyIndex::new(cache.as_ref()).mark(key).await.unwrap();
        LruIndex::new(cache.as_ref()).touch(key).await.unwrap();

        assert!(scheduler.try_flush_and_evict(key).await);

        let doc = origin.find_one("tags", "uid", "1", &[]).await.unwrap().unwrap();
        let field = doc.as_object().unwrap().get("scores").unwrap();
        let crate::codec::DocValue::Array(items) = field else { panic!("expected array") };
        assert_eq!(items.len(), 1);
        let record = items[0].as_object().unwrap();
        assert_eq!(record.get("uid"), Some(&crate::codec::DocValue::I64(42)));
        assert_eq!(record.get("isStar"), Some(&crate::codec::DocValue::F64(1.0)));
    }
}
