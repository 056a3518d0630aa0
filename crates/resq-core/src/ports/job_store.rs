//! JobStore port - the shared backing store.
//!
//! Every method maps onto one atomic store command. The queue never needs
//! more than that: no transactions, no scripts, no locks.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store operation failed: {0}")]
    OperationFailed(String),
}

/// Lists, sets, plain keys and counters.
///
/// - `push` appends to the tail, `pop` removes from the head (FIFO).
/// - `pop` must hand a given entry to exactly one caller.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn push(&self, list: &str, value: &str) -> Result<u64, StoreError>;

    async fn pop(&self, list: &str) -> Result<Option<String>, StoreError>;

    async fn list_len(&self, list: &str) -> Result<u64, StoreError>;

    /// Inclusive range, negative indexes count from the tail.
    async fn list_range(&self, list: &str, start: isize, stop: isize)
    -> Result<Vec<String>, StoreError>;

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError>;
}
