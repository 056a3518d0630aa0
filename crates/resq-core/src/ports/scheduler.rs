//! Scheduler port - delayed enqueue.
//!
//! A scheduled job is invisible to `reserve` until the backend hands it
//! back from `take_due` and the queue connection pushes it into its list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::domain::JobPayload;

/// A delayed job and the queue it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub queue: String,
    pub payload: JobPayload,
}

/// One entry claimed by `take_due`.
#[derive(Debug, Clone, PartialEq)]
pub enum DueJob {
    Ready(ScheduledJob),
    /// Claimed but unreadable; `raw` is the stored entry as-is.
    Undecodable { raw: String, reason: String },
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn enqueue_at(&self, at: DateTime<Utc>, job: ScheduledJob) -> Result<(), StoreError>;

    /// Remove and return every entry due at `now`.
    ///
    /// Each entry is returned to exactly one caller even when several
    /// workers promote concurrently. Claimed entries are gone from the
    /// backend, so the caller owns every one it gets back.
    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DueJob>, StoreError>;
}
