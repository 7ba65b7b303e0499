//! In-memory fakes for `CacheStore` and `OriginStore` (component O),
//! letting scenario and property tests run deterministically without a
//! real Redis or SQL backend — grounded on the same "swap the trait
//! object, keep the test" approach the pack's `reifydb-testing` crate
//! uses for its storage-engine double.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::codec::DocValue;
use crate::error::{CacheError, OriginError};
use crate::store::{CacheResult, CacheStore, OriginResult, OriginStore, StructuredRebuild};

#[derive(Default)]
struct CacheState {
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    sets: BTreeMap<String, std::collections::BTreeSet<String>>,
    lists: BTreeMap<String, Vec<String>>,
    zsets: BTreeMap<String, BTreeMap<String, f64>>,
    strings: BTreeMap<String, (String, Option<Instant>)>,
}

/// A single-process, mutex-guarded stand-in for a real cache backend.
/// Every operation takes the same lock, so `try_compare_and_delete`'s
/// "transaction" is simply holding it across the compare-and-delete.
pub struct InMemoryCacheStore {
    state: Mutex<CacheState>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self { state: Mutex::new(CacheState::default()) }
    }

    fn is_expired(entry: &(String, Option<Instant>)) -> bool {
        matches!(entry.1, Some(expires_at) if Instant::now() >= expires_at)
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        state
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_mset(&self, key: &str, fields: &[(String, String)]) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        let hash = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<Vec<(String, String)>> {
        let state = self.state.lock().await;
        Ok(state
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hash_del(&self, key: &str, field: &str) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        if let Some(hash) = state.hashes.get_mut(key) {
            hash.remove(field);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let state = self.state.lock().await;
        Ok(state.hashes.contains_key(key)
            || state.sets.contains_key(key)
            || state.lists.contains_key(key)
            || state.zsets.contains_key(key)
            || state.strings.get(key).map(|e| !Self::is_expired(e)).unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        state.hashes.remove(key);
        state.sets.remove(key);
        state.lists.remove(key);
        state.zsets.remove(key);
        state.strings.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let set = state.sets.entry(key.to_string()).or_default();
        let mut added = 0;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let Some(set) = state.sets.get_mut(key) else { return Ok(0) };
        let mut removed = 0;
        for member in members {
            if set.remove(member) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn set_card(&self, key: &str) -> CacheResult<u64> {
        let state = self.state.lock().await;
        Ok(state.sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn set_is_member(&self, key: &str, member: &str) -> CacheResult<bool> {
        let state = self.state.lock().await;
        Ok(state.sets.get(key).map(|s| s.contains(member)).unwrap_or(false))
    }

    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn list_push_right(&self, key: &str, values: &[String]) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let list = state.lists.entry(key.to_string()).or_default();
        list.extend(values.iter().cloned());
        Ok(list.len() as u64)
    }

    async fn list_pop_left(&self, key: &str) -> CacheResult<Option<String>> {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(key) else { return Ok(None) };
        if list.is_empty() {
            Ok(None)
        } else {
            Ok(Some(list.remove(0)))
        }
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>> {
        let state = self.state.lock().await;
        let Some(list) = state.lists.get(key) else { return Ok(Vec::new()) };
        Ok(slice_inclusive(list, start, stop))
    }

    async fn list_len(&self, key: &str) -> CacheResult<u64> {
        let state = self.state.lock().await;
        Ok(state.lists.get(key).map(|l| l.len() as u64).unwrap_or(0))
    }

    async fn list_index(&self, key: &str, index: i64) -> CacheResult<Option<String>> {
        let state = self.state.lock().await;
        let Some(list) = state.lists.get(key) else { return Ok(None) };
        Ok(resolve_index(list.len(), index).and_then(|i| list.get(i).cloned()))
    }

    async fn list_rem(&self, key: &str, count: i64, value: &str) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(key) else { return Ok(0) };

        let mut removed = 0u64;
        if count == 0 {
            let before = list.len();
            list.retain(|v| v != value);
            removed = (before - list.len()) as u64;
        } else if count > 0 {
            let mut remaining = count;
            let mut out = Vec::with_capacity(list.len());
            for item in list.drain(..) {
                if remaining > 0 && item == value {
                    remaining -= 1;
                    removed += 1;
                } else {
                    out.push(item);
                }
            }
            *list = out;
        } else {
            let mut remaining = -count;
            let mut out = Vec::with_capacity(list.len());
            for item in list.drain(..).rev() {
                if remaining > 0 && item == value {
                    remaining -= 1;
                    removed += 1;
                } else {
                    out.push(item);
                }
            }
            out.reverse();
            *list = out;
        }
        Ok(removed)
    }

    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        if let Some(list) = state.lists.get_mut(key) {
            *list = slice_inclusive(list, start, stop);
        }
        Ok(())
    }

    async fn zset_add(&self, key: &str, members: &[(f64, String)]) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let zset = state.zsets.entry(key.to_string()).or_default();
        let mut added = 0;
        for (score, member) in members {
            if zset.insert(member.clone(), *score).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn zset_rem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let Some(zset) = state.zsets.get_mut(key) else { return Ok(0) };
        let mut removed = 0;
        for member in members {
            if zset.remove(member).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn zset_card(&self, key: &str) -> CacheResult<u64> {
        let state = self.state.lock().await;
        Ok(state.zsets.get(key).map(|z| z.len() as u64).unwrap_or(0))
    }

    async fn zset_score(&self, key: &str, member: &str) -> CacheResult<Option<f64>> {
        let state = self.state.lock().await;
        Ok(state.zsets.get(key).and_then(|z| z.get(member).copied()))
    }

    async fn zset_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<(String, f64)>> {
        let state = self.state.lock().await;
        let Some(zset) = state.zsets.get(key) else { return Ok(Vec::new()) };
        let mut ordered: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
        ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        Ok(slice_inclusive(&ordered, start, stop))
    }

    async fn zset_rem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> CacheResult<u64> {
        let mut state = self.state.lock().await;
        let Some(zset) = state.zsets.get_mut(key) else { return Ok(0) };
        let mut ordered: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
        ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        let victims = slice_inclusive(&ordered, start, stop);
        for (member, _) in &victims {
            zset.remove(member);
        }
        Ok(victims.len() as u64)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        state.strings.insert(key.to_string(), (value.to_string(), Some(Instant::now() + ttl)));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut state = self.state.lock().await;
        let occupied = state.strings.get(key).map(|e| !Self::is_expired(e)).unwrap_or(false);
        if occupied {
            Ok(false)
        } else {
            state.strings.insert(key.to_string(), (value.to_string(), Some(Instant::now() + ttl)));
            Ok(true)
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.strings.get(key).filter(|e| !Self::is_expired(e)).map(|e| e.0.clone()))
    }

    async fn try_compare_and_delete(
        &self,
        key: &str,
        expected: &str,
        then_delete: &[String],
    ) -> CacheResult<bool> {
        let mut state = self.state.lock().await;
        let current = state.strings.get(key).filter(|e| !Self::is_expired(e)).map(|e| e.0.clone());
        if current.as_deref() != Some(expected) {
            return Ok(false);
        }
        state.strings.remove(key);
        for victim in then_delete {
            state.hashes.remove(victim);
            state.sets.remove(victim);
            state.lists.remove(victim);
            state.zsets.remove(victim);
            state.strings.remove(victim);
        }
        Ok(true)
    }

    async fn atomic_rebuild(&self, key: &str, rebuild: StructuredRebuild) -> CacheResult<()> {
        // One lock held across the clear-and-repopulate pair: no other
        // call can observe `key` between the two steps.
        let mut state = self.state.lock().await;
        state.sets.remove(key);
        state.lists.remove(key);
        state.zsets.remove(key);

        match rebuild {
            StructuredRebuild::Set(members) => {
                if !members.is_empty() {
                    state.sets.insert(key.to_string(), members.into_iter().collect());
                }
            }
            StructuredRebuild::List(values) => {
                if !values.is_empty() {
                    state.lists.insert(key.to_string(), values);
                }
            }
            StructuredRebuild::Zset(members) => {
                if !members.is_empty() {
                    let zset: BTreeMap<String, f64> =
                        members.into_iter().map(|(score, member)| (member, score)).collect();
                    state.zsets.insert(key.to_string(), zset);
                }
            }
        }
        Ok(())
    }
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    if resolved < 0 || resolved as usize >= len {
        None
    } else {
        Some(resolved as usize)
    }
}

/// Redis-style inclusive, negative-aware range slice (covers `LRANGE`,
/// `LTRIM`, and `ZRANGE`'s index semantics).
fn slice_inclusive<T: Clone>(items: &[T], start: i64, stop: i64) -> Vec<T> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len as i64 + i).max(0)
        } else {
            i
        }
    };
    let start = norm(start).min(len as i64 - 1).max(0);
    let stop = norm(stop).min(len as i64 - 1);
    if stop < start {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}

/// In-memory `OriginStore`: one `BTreeMap` per collection, keyed by
/// primary key string, storing a whole `DocValue::Object` document.
pub struct InMemoryOriginStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, BTreeMap<String, DocValue>>>>,
}

impl InMemoryOriginStore {
    pub fn new() -> Self {
        Self { collections: Mutex::new(BTreeMap::new()) }
    }

    pub async fn seed(&self, collection: &str, pk: &str, document: BTreeMap<String, DocValue>) {
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(pk.to_string(), document);
    }
}

impl Default for InMemoryOriginStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginStore for InMemoryOriginStore {
    async fn find_one(
        &self,
        collection: &str,
        _pk_field: &str,
        pk: &str,
        ignore: &[String],
    ) -> OriginResult<Option<DocValue>> {
        let collections = self.collections.lock().await;
        let Some(document) = collections.get(collection).and_then(|c| c.get(pk)) else {
            return Ok(None);
        };
        let mut filtered = document.clone();
        for field in ignore {
            filtered.remove(field);
        }
        Ok(Some(DocValue::Object(filtered)))
    }

    async fn update_set(
        &self,
        collection: &str,
        _pk_field: &str,
        pk: &str,
        set: DocValue,
    ) -> OriginResult<()> {
        let Some(patch) = set.into_object() else {
            return Err(OriginError::Backend(
                "update_set requires an object-shaped patch".to_string(),
            ));
        };
        let mut collections = self.collections.lock().await;
        let document = collections
            .entry(collection.to_string())
            .or_default()
            .entry(pk.to_string())
            .or_default();
        for (field, value) in patch {
            document.insert(field, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_delete_bundles_victims_atomically() {
        let store = InMemoryCacheStore::new();
        store.set_if_absent("lock:tags:1", "holder-a", Duration::from_secs(10)).await.unwrap();
        store.hash_set("tags:1", "name", "widgets").await.unwrap();

        let ok = store
            .try_compare_and_delete("lock:tags:1", "holder-a", &["tags:1".to_string()])
            .await
            .unwrap();
        assert!(ok);
        assert!(!store.exists("tags:1").await.unwrap());
        assert!(store.get("lock:tags:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compare_and_delete_rejects_wrong_holder() {
        let store = InMemoryCacheStore::new();
        store.set_if_absent("lock:tags:1", "holder-a", Duration::from_secs(10)).await.unwrap();

        let ok = store.try_compare_and_delete("lock:tags:1", "holder-b", &[]).await.unwrap();
        assert!(!ok);
        assert!(store.get("lock:tags:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_rem_negative_count_scans_tail_to_head() {
        let store = InMemoryCacheStore::new();
        let values: Vec<String> = ["a", "b", "a", "c", "a"].iter().map(|s| s.to_string()).collect();
        store.list_push_right("l", &values).await.unwrap();

        let removed = store.list_rem("l", -2, "a").await.unwrap();
        assert_eq!(removed, 2);
        let remaining = store.list_range("l", 0, -1).await.unwrap();
        assert_eq!(remaining, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn list_index_supports_negative_indices() {
        let store = InMemoryCacheStore::new();
        let values: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        store.list_push_right("l", &values).await.unwrap();

        assert_eq!(store.list_index("l", -1).await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.list_index("l", -4).await.unwrap(), None);
    }
}
