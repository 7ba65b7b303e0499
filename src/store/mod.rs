//! External interfaces this crate depends on (components I and J): the
//! cache store (fast, key/value, structure-aware) and the origin store
//! (the document system of record).

mod cache;
mod origin;

pub use cache::RedisCacheStore;
pub use origin::SqlxOriginStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;
use crate::error::OriginError;
use crate::codec::DocValue;

pub type CacheResult<T> = Result<T, CacheError>;
pub type OriginResult<T> = Result<T, OriginError>;

/// The replacement payload for `CacheStore::atomic_rebuild`: a structured
/// field's full contents after the key it lived at is cleared.
pub enum StructuredRebuild {
    Set(Vec<String>),
    List(Vec<String>),
    Zset(Vec<(f64, String)>),
}

/// The fast key/value backend fronting the origin. All structured-field
/// shapes (set/list/zset) plus the plain hash and string operations the
/// rest of the crate needs are expressed here so both the `redis`
/// adapter and the in-memory test double implement one contract.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;
    async fn hash_mset(&self, key: &str, fields: &[(String, String)]) -> CacheResult<()>;
    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<String>>;
    async fn hash_get_all(&self, key: &str) -> CacheResult<Vec<(String, String)>>;
    async fn hash_del(&self, key: &str, field: &str) -> CacheResult<()>;
    async fn exists(&self, key: &str) -> CacheResult<bool>;
    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn set_add(&self, key: &str, members: &[String]) -> CacheResult<u64>;
    async fn set_remove(&self, key: &str, members: &[String]) -> CacheResult<u64>;
    async fn set_card(&self, key: &str) -> CacheResult<u64>;
    async fn set_is_member(&self, key: &str, member: &str) -> CacheResult<bool>;
    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>>;

    async fn list_push_right(&self, key: &str, values: &[String]) -> CacheResult<u64>;
    async fn list_pop_left(&self, key: &str) -> CacheResult<Option<String>>;
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>>;
    async fn list_len(&self, key: &str) -> CacheResult<u64>;
    async fn list_index(&self, key: &str, index: i64) -> CacheResult<Option<String>>;
    async fn list_rem(&self, key: &str, count: i64, value: &str) -> CacheResult<u64>;
    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> CacheResult<()>;

    async fn zset_add(&self, key: &str, members: &[(f64, String)]) -> CacheResult<u64>;
    async fn zset_rem(&self, key: &str, members: &[String]) -> CacheResult<u64>;
    async fn zset_card(&self, key: &str) -> CacheResult<u64>;
    async fn zset_score(&self, key: &str, member: &str) -> CacheResult<Option<f64>>;
    async fn zset_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<(String, f64)>>;
    async fn zset_rem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> CacheResult<u64>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Packages the WATCH/MULTI/EXEC linearisation point used both by
    /// lease release and by the flush scheduler's evict step: if `key`'s
    /// current value still equals `expected`, atomically delete `key`
    /// and every key in `then_delete`, returning `true`. Otherwise
    /// leaves everything untouched and returns `false` without error —
    /// lost-race is an ordinary outcome here, not a failure.
    async fn try_compare_and_delete(
        &self,
        key: &str,
        expected: &str,
        then_delete: &[String],
    ) -> CacheResult<bool>;

    /// Atomically clears `key` and repopulates it per `rebuild` in one
    /// cache transaction, so a concurrent reader never observes `key` in
    /// the transiently-empty state a plain delete-then-add sequence would
    /// expose (invariant 5: structured-field replace never loses data
    /// visible to a racing reader).
    async fn atomic_rebuild(&self, key: &str, rebuild: StructuredRebuild) -> CacheResult<()>;
}

/// The document system of record. A `CollectionHandle` only ever reads
/// one whole document and writes one flat merge-patch back.
#[async_trait]
pub trait OriginStore: Send + Sync {
    async fn find_one(
        &self,
        collection: &str,
        pk_field: &str,
        pk: &str,
        ignore: &[String],
    ) -> OriginResult<Option<DocValue>>;

    async fn update_set(
        &self,
        collection: &str,
        pk_field: &str,
        pk: &str,
        set: DocValue,
    ) -> OriginResult<()>;
}
