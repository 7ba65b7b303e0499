//! Dirty set and LRU queue (component E): thin wrappers over the two
//! cache-wide, fixed-name structures every collection shares.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CacheError;
use crate::store::CacheStore;

/// Name of the cache-wide dirty set, matching the original's literal
/// `KEYS_MODIFIED_SET` constant.
pub const KEYS_MODIFIED: &str = "keys_modified";

/// Name of the cache-wide LRU sorted set, matching the original's
/// literal `LRU_QUEUE` constant.
pub const LRU_QUEUE: &str = "lru_queue";

/// Current wall-clock time as a sub-second Unix timestamp, mirroring the
/// original's `time.time()` used as the LRU score.
pub fn now_score() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Wrapper over `CacheStore::set_add`/`set_remove` against the fixed
/// `keys_modified` set.
pub struct DirtyIndex<'a, C: CacheStore> {
    store: &'a C,
}

impl<'a, C: CacheStore> DirtyIndex<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    pub async fn mark(&self, key: &str) -> Result<(), CacheError> {
        self.store.set_add(KEYS_MODIFIED, &[key.to_string()]).await?;
        Ok(())
    }

    pub async fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.store.set_remove(KEYS_MODIFIED, &[key.to_string()]).await?;
        Ok(())
    }

    pub async fn is_dirty(&self, key: &str) -> Result<bool, CacheError> {
        self.store.set_is_member(KEYS_MODIFIED, key).await
    }

    pub async fn all(&self) -> Result<Vec<String>, CacheError> {
        self.store.set_members(KEYS_MODIFIED).await
    }
}

/// Wrapper over `CacheStore::zset_add`/etc. against the fixed
/// `lru_queue` sorted set, scored by `now_score()` at each touch.
pub struct LruIndex<'a, C: CacheStore> {
    store: &'a C,
}

impl<'a, C: CacheStore> LruIndex<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    pub async fn touch(&self, key: &str) -> Result<(), CacheError> {
        self.store.zset_add(LRU_QUEUE, &[(now_score(), key.to_string())]).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.zset_rem(LRU_QUEUE, &[key.to_string()]).await?;
        Ok(())
    }

    pub async fn len(&self) -> Result<u64, CacheError> {
        self.store.zset_card(LRU_QUEUE).await
    }

    /// Keys in ascending score order (least-recently-touched first),
    /// paged by rank as the original's `EVERY_ZRANGE_NUM` walk does.
    pub async fn oldest(&self, count: u64) -> Result<Vec<(String, f64)>, CacheError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.store.zset_range(LRU_QUEUE, 0, count as i64 - 1).await
    }
}
