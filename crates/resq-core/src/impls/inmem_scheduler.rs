//! InMemoryScheduler - delayed jobs kept in a time-ordered map.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::{DueJob, ScheduledJob, Scheduler, StoreError};

/// Entries are keyed by (due time, insertion sequence) so equal due times
/// keep FIFO order.
#[derive(Default)]
pub struct InMemoryScheduler {
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    entries: BTreeMap<(DateTime<Utc>, u64), ScheduledJob>,
    next_seq: u64,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs still waiting for their due time.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.entries.len())
            .unwrap_or_default()
    }

    /// Due times of all pending jobs, earliest first.
    pub fn due_times(&self) -> Vec<DateTime<Utc>> {
        self.state
            .lock()
            .map(|state| state.entries.keys().map(|(at, _)| *at).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn enqueue_at(&self, at: DateTime<Utc>, job: ScheduledJob) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::OperationFailed(format!("scheduler lock poisoned: {e}")))?;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert((at, seq), job);
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DueJob>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StoreError::OperationFailed(format!("scheduler lock poisoned: {e}")))?;
        let later = state.entries.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut state.entries, later);
        Ok(due.into_values().map(DueJob::Ready).collect())
    }
}
