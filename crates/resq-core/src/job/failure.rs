//! FailureRecorder - appends to the failure log.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::domain::{FailureRecord, JobPayload, JobToken, WorkerIdentity};
use crate::error::{JobError, Result};
use crate::ports::{Clock, JobStore};

/// Job name of failure records whose stored payload could not be decoded.
pub const UNDECODABLE_JOB: &str = "Undecodable";

pub struct FailureRecorder {
    store: Arc<dyn JobStore>,
    failed_key: String,
    clock: Arc<dyn Clock>,
}

impl FailureRecorder {
    pub fn new(store: Arc<dyn JobStore>, failed_key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            failed_key: failed_key.into(),
            clock,
        }
    }

    /// Copy of `payload` with its attempts moved into `failed_attempts` and
    /// reset to 1, so a retried copy passes the max-attempts check again.
    pub fn reset_attempts(payload: &JobPayload) -> JobPayload {
        let mut payload = payload.clone();
        payload.failed_attempts = Some(payload.attempts());
        payload.attempts = 1;
        payload
    }

    /// Build the record and append it to the log.
    pub async fn record(
        &self,
        payload: &JobPayload,
        error: &JobError,
        worker: &WorkerIdentity,
        queue: &str,
    ) -> Result<FailureRecord> {
        let record = FailureRecord {
            failed_at: self.clock.now(),
            payload: Self::reset_attempts(payload),
            exception: error.kind().to_string(),
            error: error.message().to_string(),
            backtrace: error.backtrace().to_vec(),
            worker: worker.to_string(),
            queue: queue.to_string(),
        };
        self.append(&record).await?;
        Ok(record)
    }

    /// Log a stored entry that is not a valid payload. The raw text is kept
    /// under the `raw` argument of an `Undecodable` job.
    pub async fn record_undecodable(
        &self,
        id: JobToken,
        raw: &str,
        reason: &str,
        source: &str,
    ) -> Result<FailureRecord> {
        let record = FailureRecord {
            failed_at: self.clock.now(),
            payload: JobPayload::new(UNDECODABLE_JOB, id, json!({ "raw": raw })),
            exception: "Serialization".to_string(),
            error: reason.to_string(),
            backtrace: Vec::new(),
            worker: String::new(),
            queue: source.to_string(),
        };
        self.append(&record).await?;
        Ok(record)
    }

    async fn append(&self, record: &FailureRecord) -> Result<()> {
        self.store
            .push(&self.failed_key, &serde_json::to_string(record)?)
            .await?;
        warn!(
            job = %record.payload.job,
            token = %record.payload.id,
            exception = %record.exception,
            worker = %record.worker,
            "failure recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryJobStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn record_resets_attempts_and_appends() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let store = Arc::new(InMemoryJobStore::new());
        let recorder = FailureRecorder::new(store.clone(), "resque:failed", Arc::new(FixedClock::new(now)));

        let mut payload = JobPayload::new("SendEmail", JobToken::new("t1"), json!({"to": "a@b.com"}));
        payload.attempts = 4;
        let error = JobError::new("SmtpError", "refused").with_backtrace(["caused by: reset"]);
        let worker = WorkerIdentity::new("web-1", 7, "emails");

        let record = recorder.record(&payload, &error, &worker, "emails").await.unwrap();

        assert_eq!(record.payload.attempts, 1);
        assert_eq!(record.payload.failed_attempts, Some(4));
        assert_eq!(record.exception, "SmtpError");
        assert_eq!(record.error, "refused");
        assert_eq!(record.backtrace, ["caused by: reset"]);
        assert_eq!(record.worker, "web-1:7:emails");
        assert_eq!(record.failed_at, now);
        // caller's payload is untouched
        assert_eq!(payload.attempts, 4);

        let stored = store.list_range("resque:failed", 0, -1).await.unwrap();
        assert_eq!(stored.len(), 1);
        let back: FailureRecord = serde_json::from_str(&stored[0]).unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn undecodable_entry_keeps_its_raw_text() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let store = Arc::new(InMemoryJobStore::new());
        let recorder = FailureRecorder::new(store.clone(), "resque:failed", Arc::new(FixedClock::new(now)));

        let record = recorder
            .record_undecodable(JobToken::new("t9"), "{not json", "expected value", "queue:emails")
            .await
            .unwrap();

        assert_eq!(record.payload.job, UNDECODABLE_JOB);
        assert_eq!(record.payload.data["raw"], "{not json");
        assert_eq!(record.exception, "Serialization");
        assert_eq!(record.queue, "queue:emails");
        assert_eq!(store.list_len("resque:failed").await.unwrap(), 1);
    }
}
