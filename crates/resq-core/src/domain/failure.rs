//! Failure log entries and worker heartbeats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobPayload;

/// One terminally failed job, as appended to the failure log.
///
/// Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub failed_at: DateTime<Utc>,
    pub payload: JobPayload,
    /// Error type name.
    pub exception: String,
    /// Error message.
    pub error: String,
    pub backtrace: Vec<String>,
    pub worker: String,
    pub queue: String,
}

/// What a busy worker is doing right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub queue: String,
    pub run_at: DateTime<Utc>,
    pub payload: JobPayload,
}
