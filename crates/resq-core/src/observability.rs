use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counters and sizes read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs finished by any worker, failed ones included.
    pub processed: u64,
    pub failed: u64,
    pub workers: usize,
    /// Pending jobs per known queue.
    pub queues: BTreeMap<String, u64>,
    /// Length of the failure log.
    pub failure_log: u64,
}

impl QueueStats {
    pub fn pending(&self) -> u64 {
        self.queues.values().sum()
    }
}
