//! # bb-kv-redis
//! bulletin-board/crates/bb-plugins/bb-kv-redis/src/lib.rs
//! Redis implementation of `KeyValueStore`.
//! Features: pooled connections, `SET NX` for ad creation, and a Lua
//! compare-and-set so comment appends stay atomic across processes.

use async_trait::async_trait;
use bb_core::error::{AppError, Result};
use bb_core::traits::KeyValueStore;
use deadpool_redis::redis::{self, Script};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use std::time::Duration;
use tracing::info;

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Replaces KEYS[1] with ARGV[2] only while it still holds ARGV[1].
const COMPARE_AND_SET: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

pub struct RedisStore {
    pool: Pool,
    compare_and_set: Script,
}

impl RedisStore {
    /// Builds the connection pool. Connections are opened lazily, so an
    /// unreachable server shows up on first use as `StoreUnavailable`.
    pub fn connect(url: &str, pool_size: usize, wait_timeout: Duration) -> Result<Self> {
        let mut pool_config = PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(wait_timeout);
        pool_config.timeouts.create = Some(wait_timeout);

        let mut config = Config::from_url(url);
        config.pool = Some(pool_config);
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(AppError::store)?;

        info!(pool_size, "redis store pool created");
        Ok(Self {
            pool,
            compare_and_set: Script::new(COMPARE_AND_SET),
        })
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(AppError::store)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(AppError::store)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(AppError::store)?;
        Ok(())
    }

    async fn scan_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(AppError::store)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let reply: redis::Value = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(AppError::store)?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let swapped: i64 = self
            .compare_and_set
            .key(key)
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(AppError::store)?;
        Ok(swapped == 1)
    }
}
