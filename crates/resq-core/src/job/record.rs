//! JobRecord: one reserved payload and where it came from.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::HandlerRegistry;
use crate::domain::{FailureRecord, JobArguments, JobEvent, JobPayload, JobStatus, JobToken, WorkerIdentity};
use crate::error::{JobError, ResqError, Result};
use crate::queue::QueueConnection;

/// A reserved job.
///
/// State transitions:
/// - Reserved -> Running -> Complete (`fire` succeeded)
/// - Reserved -> Running -> Failed (`has_failed`)
/// - any -> Released (`release`, the payload is back in the store)
///
/// Once deleted, completed or released, `release` does nothing.
pub struct JobRecord {
    connection: Arc<QueueConnection>,
    queue: String,
    payload: JobPayload,
    deleted: bool,
    released: bool,
    completed: bool,
    failed: bool,
}

impl JobRecord {
    pub fn new(connection: Arc<QueueConnection>, queue: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            connection,
            queue: queue.into(),
            payload,
            deleted: false,
            released: false,
            completed: false,
            failed: false,
        }
    }

    /// Run the handler registered for this job's name.
    ///
    /// Handler errors come back as `ExecutionFailure` and nothing is
    /// recorded here; the caller decides between release and failure.
    pub async fn fire(&mut self, handlers: &HandlerRegistry) -> Result<()> {
        let connection = Arc::clone(&self.connection);
        connection
            .update_status(&self.payload.id, JobStatus::Running)
            .await?;

        let handler = handlers
            .get(&self.payload.job)
            .cloned()
            .ok_or_else(|| ResqError::HandlerNotFound(self.payload.job.clone()))?;

        connection.events().emit(&JobEvent::BeforePerform {
            job: &self.payload.job,
            token: &self.payload.id,
            queue: &self.queue,
        });

        handler.perform(self).await?;

        connection.events().emit(&JobEvent::AfterPerform {
            job: &self.payload.job,
            token: &self.payload.id,
            queue: &self.queue,
        });

        // a handler that released itself is Waiting again
        if !self.released {
            connection
                .update_status(&self.payload.id, JobStatus::Complete)
                .await?;
        }
        self.completed = true;
        Ok(())
    }

    /// Bump attempts and put the job back, optionally after `delay`.
    pub async fn release(&mut self, delay: Duration) -> Result<()> {
        if self.deleted || self.released || self.completed {
            return Ok(());
        }
        self.payload.attempts = self.payload.attempts() + 1;
        let connection = Arc::clone(&self.connection);
        connection.release(self, delay).await?;
        self.released = true;
        Ok(())
    }

    /// Mark the job consumed. It will not be released afterwards.
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    /// Mark Failed, write the failure record and bump the failed counters.
    pub async fn has_failed(&mut self, error: &JobError, worker: &WorkerIdentity) -> Result<FailureRecord> {
        let connection = Arc::clone(&self.connection);
        connection
            .update_status(&self.payload.id, JobStatus::Failed)
            .await?;
        let record = connection
            .failure_recorder()
            .record(&self.payload, error, worker, &self.queue)
            .await?;
        connection.count_failure(worker).await?;
        self.failed = true;

        connection.events().emit(&JobEvent::JobFailed {
            job: &self.payload.job,
            token: &self.payload.id,
            queue: &self.queue,
            error,
        });
        Ok(record)
    }

    pub fn attempts(&self) -> u32 {
        self.payload.attempts()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn job_name(&self) -> &str {
        &self.payload.job
    }

    pub fn token(&self) -> &JobToken {
        &self.payload.id
    }

    pub fn arguments(&self) -> &JobArguments {
        &self.payload.data
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.payload.data.get(name)
    }

    pub fn command(&self) -> Option<&str> {
        self.payload.command.as_deref()
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn connection(&self) -> &Arc<QueueConnection> {
        &self.connection
    }
}

impl std::fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRecord")
            .field("queue", &self.queue)
            .field("payload", &self.payload)
            .field("deleted", &self.deleted)
            .field("released", &self.released)
            .field("completed", &self.completed)
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryJobStore, RecordingEventSink};
    use crate::job::JobHandler;
    use async_trait::async_trait;
    use serde_json::json;

    struct Succeed;

    #[async_trait]
    impl JobHandler for Succeed {
        async fn perform(&self, _job: &mut JobRecord) -> std::result::Result<(), JobError> {
            Ok(())
        }
    }

    struct Explode;

    #[async_trait]
    impl JobHandler for Explode {
        async fn perform(&self, _job: &mut JobRecord) -> std::result::Result<(), JobError> {
            Err(JobError::new("Boom", "exploded"))
        }
    }

    struct ReleaseSelf;

    #[async_trait]
    impl JobHandler for ReleaseSelf {
        async fn perform(&self, job: &mut JobRecord) -> std::result::Result<(), JobError> {
            job.release(Duration::ZERO)
                .await
                .map_err(|e| JobError::from_error(&e))
        }
    }

    fn registry() -> HandlerRegistry {
        let mut reg = HandlerRegistry::new();
        reg.register("Succeed", Arc::new(Succeed)).unwrap();
        reg.register("Explode", Arc::new(Explode)).unwrap();
        reg.register("ReleaseSelf", Arc::new(ReleaseSelf)).unwrap();
        reg
    }

    async fn reserved(job: &str) -> (Arc<QueueConnection>, Arc<RecordingEventSink>, JobRecord) {
        let events = Arc::new(RecordingEventSink::new());
        let conn = Arc::new(
            QueueConnection::new(Arc::new(InMemoryJobStore::new())).with_events(events.clone()),
        );
        conn.enqueue(job, json!({"to": "a@b.com"}), Some("q"), true)
            .await
            .unwrap();
        let record = conn.pop(Some("q")).await.unwrap().unwrap();
        (conn, events, record)
    }

    #[tokio::test]
    async fn fire_runs_handler_between_hooks() {
        let (conn, events, mut job) = reserved("Succeed").await;
        job.fire(&registry()).await.unwrap();

        assert!(conn.is_complete(job.token()).await.unwrap());
        assert_eq!(events.names(), ["beforePerform", "afterPerform"]);
        assert!(job.is_completed());

        // completed jobs are not released
        job.release(Duration::ZERO).await.unwrap();
        assert_eq!(job.attempts(), 1);
        assert!(conn.reserve(Some("q")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_error_propagates_and_leaves_job_running() {
        let (conn, events, mut job) = reserved("Explode").await;
        let err = job.fire(&registry()).await.unwrap_err();

        assert!(matches!(&err, ResqError::ExecutionFailure(e) if e.kind() == "Boom"));
        assert!(conn.is_running(job.token()).await.unwrap());
        assert_eq!(events.names(), ["beforePerform"]);
    }

    #[tokio::test]
    async fn unknown_job_name_fails_fire() {
        let (_conn, _events, mut job) = reserved("Nobody").await;
        let err = job.fire(&registry()).await.unwrap_err();
        assert!(matches!(err, ResqError::HandlerNotFound(name) if name == "Nobody"));
    }

    #[tokio::test]
    async fn release_bumps_attempts_once_and_keeps_identity() {
        let (conn, _events, mut job) = reserved("Explode").await;
        let token = job.token().clone();

        job.release(Duration::ZERO).await.unwrap();
        job.release(Duration::ZERO).await.unwrap();
        assert_eq!(job.attempts(), 2);
        assert!(job.is_released());

        let back = conn.reserve(Some("q")).await.unwrap().unwrap();
        assert_eq!(back.id, token);
        assert_eq!(back.job, "Explode");
        assert_eq!(back.attempts, 2);
        assert_eq!(back.data["to"], "a@b.com");
        assert!(conn.reserve(Some("q")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_jobs_are_not_released() {
        let (conn, _events, mut job) = reserved("Explode").await;
        job.delete();
        job.release(Duration::ZERO).await.unwrap();

        assert!(job.is_deleted());
        assert_eq!(job.attempts(), 1);
        assert!(conn.reserve(Some("q")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn self_released_job_stays_waiting() {
        let (conn, _events, mut job) = reserved("ReleaseSelf").await;
        job.fire(&registry()).await.unwrap();

        assert!(conn.is_waiting(job.token()).await.unwrap());
        assert_eq!(conn.reserve(Some("q")).await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn has_failed_records_and_counts() {
        let (conn, events, mut job) = reserved("Explode").await;
        let worker = WorkerIdentity::new("web-1", 9, "q");
        job.release(Duration::ZERO).await.unwrap();
        conn.reserve(Some("q")).await.unwrap();

        let error = JobError::new("Boom", "exploded");
        let record = job.has_failed(&error, &worker).await.unwrap();

        assert_eq!(record.payload.attempts, 1);
        assert_eq!(record.payload.failed_attempts, Some(2));
        assert!(conn.is_failed(job.token()).await.unwrap());
        assert_eq!(conn.stats().await.unwrap().failed, 1);
        assert_eq!(conn.worker_counter("failed", &worker).await.unwrap(), 1);
        assert_eq!(conn.failures(0, 10).await.unwrap(), [record]);
        assert_eq!(events.names(), ["onFailure"]);
    }
}
