//! `redis`-backed `CacheStore` (component I), grounded on the teacher's
//! `JobQueue`/`DistributedLock` connection-manager usage
//! (`src/scheduling/{queue,scheduler}.rs`): a cloned `ConnectionManager`
//! per call, raw `redis::cmd` for everything the high-level
//! `redis::AsyncCommands` convenience layer doesn't cover cleanly
//! (notably the Lua-scripted compare-and-delete).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::CacheError;
use crate::store::{CacheResult, CacheStore, StructuredRebuild};

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Thin wrapper over a cloneable `redis` connection manager.
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url).map_err(CacheError::from)?;
        let conn = ConnectionManager::new(client).await.map_err(CacheError::from)?;
        Ok(Self { conn })
    }

    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn hash_mset(&self, key: &str, fields: &[(String, String)]) -> CacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        cmd.query_async(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let value: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(pairs)
    }

    async fn hash_del(&self, key: &str, field: &str) -> CacheResult<()> {
        redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let count: u64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        redis::cmd("DEL").arg(key).query_async(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key);
        for member in members {
            cmd.arg(member);
        }
        Ok(cmd.query_async(&mut self.conn.clone()).await?)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("SREM");
        cmd.arg(key);
        for member in members {
            cmd.arg(member);
        }
        Ok(cmd.query_async(&mut self.conn.clone()).await?)
    }

    async fn set_card(&self, key: &str) -> CacheResult<u64> {
        Ok(redis::cmd("SCARD").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn set_is_member(&self, key: &str, member: &str) -> CacheResult<bool> {
        Ok(redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        Ok(redis::cmd("SMEMBERS").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn list_push_right(&self, key: &str, values: &[String]) -> CacheResult<u64> {
        if values.is_empty() {
            return Ok(self.list_len(key).await?);
        }
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key);
        for value in values {
            cmd.arg(value);
        }
        Ok(cmd.query_async(&mut self.conn.clone()).await?)
    }

    async fn list_pop_left(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(redis::cmd("LPOP").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>> {
        Ok(redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn list_len(&self, key: &str) -> CacheResult<u64> {
        Ok(redis::cmd("LLEN").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn list_index(&self, key: &str, index: i64) -> CacheResult<Option<String>> {
        Ok(redis::cmd("LINDEX")
            .arg(key)
            .arg(index)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn list_rem(&self, key: &str, count: i64, value: &str) -> CacheResult<u64> {
        Ok(redis::cmd("LREM")
            .arg(key)
            .arg(count)
            .arg(value)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> CacheResult<()> {
        redis::cmd("LTRIM")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn zset_add(&self, key: &str, members: &[(f64, String)]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key);
        for (score, member) in members {
            cmd.arg(score).arg(member);
        }
        Ok(cmd.query_async(&mut self.conn.clone()).await?)
    }

    async fn zset_rem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(key);
        for member in members {
            cmd.arg(member);
        }
        Ok(cmd.query_async(&mut self.conn.clone()).await?)
    }

    async fn zset_card(&self, key: &str) -> CacheResult<u64> {
        Ok(redis::cmd("ZCARD").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn zset_score(&self, key: &str, member: &str) -> CacheResult<Option<f64>> {
        Ok(redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn zset_range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<(String, f64)>> {
        let flat: Vec<String> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(flat
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].parse().unwrap_or(0.0)))
            .collect())
    }

    async fn zset_rem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> CacheResult<u64> {
        Ok(redis::cmd("ZREMRANGEBYRANK")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.conn.clone())
            .await?)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(redis::cmd("GET").arg(key).query_async(&mut self.conn.clone()).await?)
    }

    async fn try_compare_and_delete(
        &self,
        key: &str,
        expected: &str,
        then_delete: &[String],
    ) -> CacheResult<bool> {
        // Mirrors the teacher's lock-release script (`DistributedLock::release`):
        // a single Lua EVAL keeps the read-compare-delete atomic without the
        // client round-tripping WATCH/MULTI/EXEC itself.
        let script = r#"
            if redis.call("get", KEYS[1]) == ARGV[1] then
                redis.call("del", KEYS[1])
                for i = 2, #KEYS do
                    redis.call("del", KEYS[i])
                end
                return 1
            else
                return 0
            end
        "#;

        let mut cmd = redis::cmd("EVAL");
        cmd.arg(script);
        cmd.arg(1 + then_delete.len());
        cmd.arg(key);
        for extra in then_delete {
            cmd.arg(extra);
        }
        cmd.arg(expected);

        let result: i32 = cmd.query_async(&mut self.conn.clone()).await?;
        Ok(result == 1)
    }

    async fn atomic_rebuild(&self, key: &str, rebuild: StructuredRebuild) -> CacheResult<()> {
        // MULTI/EXEC via `redis::pipe().atomic()` so the DEL and the
        // repopulating command commit as one unit — no window where a
        // concurrent reader sees `key` absent.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("DEL").arg(key).ignore();

        match rebuild {
            StructuredRebuild::Set(members) => {
                if !members.is_empty() {
                    pipe.cmd("SADD").arg(key);
                    for member in &members {
                        pipe.arg(member);
                    }
                    pipe.ignore();
                }
            }
            StructuredRebuild::List(values) => {
                if !values.is_empty() {
                    pipe.cmd("RPUSH").arg(key);
                    for value in &values {
                        pipe.arg(value);
                    }
                    pipe.ignore();
                }
            }
            StructuredRebuild::Zset(members) => {
                if !members.is_empty() {
                    pipe.cmd("ZADD").arg(key);
                    for (score, member) in &members {
                        pipe.arg(score).arg(member);
                    }
                    pipe.ignore();
                }
            }
        }

        let _: () = pipe.query_async(&mut self.conn.clone()).await?;
        Ok(())
    }
}
