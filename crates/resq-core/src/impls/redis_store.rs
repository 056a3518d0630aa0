//! Redis-backed `JobStore`.
//!
//! Uses a `ConnectionManager`, which reconnects on its own and is cheap to
//! clone, so every call works on its own clone.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::ports::{JobStore, StoreError};

#[derive(Clone)]
pub struct RedisJobStore {
    redis: ConnectionManager,
}

impl RedisJobStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { redis })
    }

    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// The underlying connection, for sharing with the scheduler.
    pub fn connection(&self) -> ConnectionManager {
        self.redis.clone()
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn push(&self, list: &str, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.rpush(list, value).await?)
    }

    async fn pop(&self, list: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.lpop(list, None).await?)
    }

    async fn list_len(&self, list: &str) -> Result<u64, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.llen(list).await?)
    }

    async fn list_range(
        &self,
        list: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.lrange(list, start, stop).await?)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.sadd::<_, _, ()>(set, member).await?;
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.srem::<_, _, ()>(set, member).await?;
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.smembers(set).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.exists(key).await?)
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.redis.clone();
        Ok(conn.incr(key, by).await?)
    }
}
