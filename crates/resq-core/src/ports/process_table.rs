//! ProcessTable port - this host and the processes running on it.
//!
//! Dead-worker pruning asks two questions: which host am I on, and which
//! worker pids are alive here. The memory ceiling check lives here too.

use std::collections::HashSet;

use async_trait::async_trait;

#[async_trait]
pub trait ProcessTable: Send + Sync {
    fn hostname(&self) -> String;

    fn current_pid(&self) -> u32;

    /// Pids of worker processes currently running on this host.
    async fn worker_pids(&self) -> std::io::Result<HashSet<u32>>;

    /// Resident memory of this process in megabytes, if known.
    fn resident_memory_mb(&self) -> Option<u64>;
}
