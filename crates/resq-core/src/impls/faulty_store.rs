//! FaultyJobStore - in-memory store that fails chosen commands on demand.

use std::sync::Mutex;

use async_trait::async_trait;

use super::InMemoryJobStore;
use crate::ports::{JobStore, StoreError};

struct Fault {
    op: &'static str,
    key_prefix: String,
    remaining: u32,
}

/// Wraps `InMemoryJobStore`; a queued fault makes the next matching command
/// fail before it reaches the inner store.
#[derive(Default)]
pub struct FaultyJobStore {
    inner: InMemoryJobStore,
    faults: Mutex<Vec<Fault>>,
}

impl FaultyJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `op` (`"push"`, `"set"`, ...) on a key starting with
    /// `key_prefix`.
    pub fn fail_next(&self, op: &'static str, key_prefix: &str) {
        self.fail_times(op, key_prefix, 1);
    }

    pub fn fail_times(&self, op: &'static str, key_prefix: &str, times: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                op,
                key_prefix: key_prefix.to_string(),
                remaining: times,
            });
        }
    }

    fn check(&self, op: &str, key: &str) -> Result<(), StoreError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|e| StoreError::OperationFailed(format!("fault lock poisoned: {e}")))?;
        let Some(fault) = faults
            .iter_mut()
            .find(|f| f.op == op && f.remaining > 0 && key.starts_with(&f.key_prefix))
        else {
            return Ok(());
        };
        fault.remaining -= 1;
        Err(StoreError::ConnectionFailed(format!("{op} {key}: connection reset")))
    }
}

#[async_trait]
impl JobStore for FaultyJobStore {
    async fn push(&self, list: &str, value: &str) -> Result<u64, StoreError> {
        self.check("push", list)?;
        self.inner.push(list, value).await
    }

    async fn pop(&self, list: &str) -> Result<Option<String>, StoreError> {
        self.check("pop", list)?;
        self.inner.pop(list).await
    }

    async fn list_len(&self, list: &str) -> Result<u64, StoreError> {
        self.check("list_len", list)?;
        self.inner.list_len(list).await
    }

    async fn list_range(
        &self,
        list: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        self.check("list_range", list)?;
        self.inner.list_range(list, start, stop).await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_add", set)?;
        self.inner.set_add(set, member).await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_remove", set)?;
        self.inner.set_remove(set, member).await
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        self.check("set_members", set)?;
        self.inner.set_members(set).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check("get", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check("set", key)?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check("exists", key)?;
        self.inner.exists(key).await
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        self.check("incr", key)?;
        self.inner.incr(key, by).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fault_hits_only_the_matching_command_once() {
        let store = FaultyJobStore::new();
        store.fail_next("push", "resque:queue:");

        store.push("resque:failed", "x").await.unwrap();
        assert!(store.push("resque:queue:q", "a").await.is_err());
        store.push("resque:queue:q", "b").await.unwrap();
        assert_eq!(store.list_range("resque:queue:q", 0, -1).await.unwrap(), ["b"]);
    }
}
