//! InMemoryJobStore - development and test store.
//!
//! Same semantics as the Redis store, minus persistence and sharing
//! between processes.

use crate::ports::{JobStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct StoreState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    values: HashMap<String, String>,
}

/// In-memory `JobStore`.
///
/// # Details
/// - one mutex over all keyspaces, so every operation is atomic
/// - the lock is never held across an `.await`
/// - empty lists and sets are dropped, like Redis does
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<StoreState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::OperationFailed(format!("store lock poisoned: {e}")))
    }
}

/// Resolve a Redis-style inclusive range against a list of `len` items.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn push(&self, list: &str, value: &str) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let entries = state.lists.entry(list.to_string()).or_default();
        entries.push_back(value.to_string());
        Ok(entries.len() as u64)
    }

    async fn pop(&self, list: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.lock()?;
        let Some(entries) = state.lists.get_mut(list) else {
            return Ok(None);
        };
        let value = entries.pop_front();
        if entries.is_empty() {
            state.lists.remove(list);
        }
        Ok(value)
    }

    async fn list_len(&self, list: &str) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state.lists.get(list).map_or(0, |l| l.len() as u64))
    }

    async fn list_range(
        &self,
        list: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.lock()?;
        let Some(entries) = state.lists.get(list) else {
            return Ok(Vec::new());
        };
        match resolve_range(entries.len(), start, stop) {
            Some((from, to)) => Ok(entries.range(from..=to).cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(members) = state.sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                state.sets.remove(set);
            }
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.lock()?;
        Ok(state.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.values.remove(key);
        state.lists.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.values.contains_key(key)
            || state.lists.contains_key(key)
            || state.sets.contains_key(key))
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        let current = match state.values.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                StoreError::OperationFailed(format!("value at {key} is not an integer"))
            })?,
            None => 0,
        };
        let next = current + by;
        state.values.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}
