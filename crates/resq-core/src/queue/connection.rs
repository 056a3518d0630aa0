//! QueueConnection - every store operation the queue core needs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::KeySpace;
use crate::domain::{
    FailureRecord, Heartbeat, JobPayload, JobStatus, JobToken, StatusRecord, WorkerIdentity,
};
use crate::error::{ResqError, Result};
use crate::job::{FailureRecorder, JobRecord};
use crate::observability::QueueStats;
use crate::ports::{
    Clock, DueJob, EventSink, EventSinks, IdGenerator, JobStore, ScheduledJob, Scheduler,
    SystemClock, UlidGenerator,
};

pub const DEFAULT_QUEUE: &str = "default";

/// Handle on one shared store.
///
/// # Details
/// - the store and the scheduler are injected; there is no global connection
/// - every method is one or a few single-key store commands, never a transaction
/// - `enqueue_if_absent` reads then writes, so two producers can both enqueue
pub struct QueueConnection {
    store: Arc<dyn JobStore>,
    scheduler: Option<Arc<dyn Scheduler>>,
    keys: KeySpace,
    default_queue: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn EventSink>,
}

impl QueueConnection {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            store,
            scheduler: None,
            keys: KeySpace::default(),
            default_queue: DEFAULT_QUEUE.to_string(),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            events: Arc::new(EventSinks::new()),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_keys(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Replace the clock. Token generation follows the new clock too.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn default_queue(&self) -> &str {
        &self.default_queue
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    // ---- producing ----

    /// Push a new job. The queue defaults to the job name.
    pub async fn enqueue(
        &self,
        job: &str,
        data: Value,
        queue: Option<&str>,
        track: bool,
    ) -> Result<JobToken> {
        let payload = JobPayload::new(job, self.ids.generate_token(), data);
        let queue = queue.unwrap_or(job);
        self.push_payload(queue, &payload, track).await?;
        debug!(job, queue, token = %payload.id, track, "enqueued");
        Ok(payload.id)
    }

    /// Enqueue only when `token` is unknown, Complete or Failed.
    ///
    /// The status read and the push are separate commands: two concurrent
    /// callers may both see a terminal status and both enqueue.
    pub async fn enqueue_if_absent(
        &self,
        token: &JobToken,
        job: &str,
        data: Value,
        queue: Option<&str>,
        track: bool,
    ) -> Result<Option<JobToken>> {
        match self.status(token).await? {
            Some(status) if !status.is_terminal() => {
                debug!(%token, ?status, "job still pending, not enqueued");
                Ok(None)
            }
            _ => self.enqueue(job, data, queue, track).await.map(Some),
        }
    }

    /// Schedule a new job `delay` from now.
    pub async fn schedule_in(
        &self,
        delay: Duration,
        job: &str,
        data: Value,
        queue: Option<&str>,
    ) -> Result<JobToken> {
        let at = self.due_in(delay)?;
        self.schedule_at(at, job, data, queue).await
    }

    /// Schedule a new job for an absolute time.
    pub async fn schedule_at(
        &self,
        at: DateTime<Utc>,
        job: &str,
        data: Value,
        queue: Option<&str>,
    ) -> Result<JobToken> {
        let scheduler = self.scheduler()?;
        let payload = JobPayload::new(job, self.ids.generate_token(), data);
        let token = payload.id.clone();
        let queue = queue.unwrap_or(job).to_string();
        scheduler
            .enqueue_at(at, ScheduledJob { queue, payload })
            .await?;
        debug!(job, %token, %at, "scheduled");
        Ok(token)
    }

    /// Raw blobs are not accepted, payloads must be structured.
    pub async fn push_raw(&self, _payload: &str, _queue: Option<&str>) -> Result<()> {
        Err(ResqError::NotImplemented("push_raw"))
    }

    // ---- consuming ----

    /// Pop the next payload from `queue` (default queue when `None`).
    ///
    /// An entry that is not a valid payload goes to the failure log and the
    /// decode error is returned.
    pub async fn reserve(&self, queue: Option<&str>) -> Result<Option<JobPayload>> {
        let queue = queue.unwrap_or(&self.default_queue);
        let key = self.keys.queue(queue);
        let Some(raw) = self.store.pop(&key).await? else {
            return Ok(None);
        };
        match JobPayload::from_json(&raw) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                self.record_undecodable(&raw, &e.to_string(), &key).await;
                Err(e.into())
            }
        }
    }

    /// Like `reserve`, wrapped in a `JobRecord` bound to this connection.
    pub async fn pop(self: &Arc<Self>, queue: Option<&str>) -> Result<Option<JobRecord>> {
        let queue = queue.unwrap_or(&self.default_queue).to_string();
        let payload = self.reserve(Some(&queue)).await?;
        Ok(payload.map(|payload| JobRecord::new(Arc::clone(self), queue, payload)))
    }

    /// Put a job back, payload as-is (the caller bumps `attempts`).
    ///
    /// With a delay and a scheduler the job is scheduled, otherwise it goes
    /// straight back on its queue. The token is kept either way, and a
    /// tracked job is Waiting again.
    pub async fn release(&self, job: &JobRecord, delay: Duration) -> Result<()> {
        let payload = job.payload();
        let tracked = self.is_tracked(&payload.id).await?;

        match &self.scheduler {
            Some(scheduler) if !delay.is_zero() => {
                let at = self.due_in(delay)?;
                scheduler
                    .enqueue_at(
                        at,
                        ScheduledJob {
                            queue: job.queue().to_string(),
                            payload: payload.clone(),
                        },
                    )
                    .await?;
                if tracked {
                    self.create_status(&payload.id).await?;
                }
                debug!(token = %payload.id, attempts = payload.attempts, %at, "released with delay");
            }
            _ => {
                self.push_payload(job.queue(), payload, tracked).await?;
                debug!(token = %payload.id, attempts = payload.attempts, "released");
            }
        }
        Ok(())
    }

    /// Move every due scheduled job onto its queue. Returns how many moved.
    ///
    /// Claimed entries are owned here: undecodable ones go to the failure
    /// log, and when a push fails the rest are scheduled again for now
    /// before the error is returned.
    pub async fn promote_scheduled(&self) -> Result<usize> {
        let Some(scheduler) = &self.scheduler else {
            return Ok(0);
        };
        let now = self.clock.now();
        let mut ready = Vec::new();
        for entry in scheduler.take_due(now).await? {
            match entry {
                DueJob::Ready(job) => ready.push(job),
                DueJob::Undecodable { raw, reason } => {
                    self.record_undecodable(&raw, &reason, &self.keys.delayed_schedule())
                        .await;
                }
            }
        }

        let mut pending = ready.into_iter();
        let mut count = 0;
        while let Some(job) = pending.next() {
            if let Err(e) = self.push_payload(&job.queue, &job.payload, false).await {
                let unpushed: Vec<_> = std::iter::once(job).chain(pending).collect();
                warn!(error = %e, count = unpushed.len(), "promotion failed, rescheduling");
                for job in unpushed {
                    if let Err(err) = scheduler.enqueue_at(now, job.clone()).await {
                        error!(
                            error = %err,
                            token = %job.payload.id,
                            payload = ?job.payload.to_json().ok(),
                            "scheduled job could not be put back"
                        );
                    }
                }
                return Err(e);
            }
            count += 1;
        }
        if count > 0 {
            info!(count, "promoted scheduled jobs");
        }
        Ok(count)
    }

    // ---- status ----

    pub async fn status(&self, token: &JobToken) -> Result<Option<JobStatus>> {
        Ok(self.status_record(token).await?.map(|r| r.status))
    }

    pub async fn status_record(&self, token: &JobToken) -> Result<Option<StatusRecord>> {
        match self.store.get(&self.keys.status(token)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Set the status of a tracked token. Untracked tokens are left alone.
    pub async fn update_status(&self, token: &JobToken, status: JobStatus) -> Result<()> {
        let Some(mut record) = self.status_record(token).await? else {
            return Ok(());
        };
        record.transition(status, self.clock.now());
        self.store
            .set(&self.keys.status(token), &serde_json::to_string(&record)?)
            .await?;
        Ok(())
    }

    pub async fn is_tracked(&self, token: &JobToken) -> Result<bool> {
        Ok(self.store.exists(&self.keys.status(token)).await?)
    }

    pub async fn is_waiting(&self, token: &JobToken) -> Result<bool> {
        Ok(self.status(token).await? == Some(JobStatus::Waiting))
    }

    pub async fn is_running(&self, token: &JobToken) -> Result<bool> {
        Ok(self.status(token).await? == Some(JobStatus::Running))
    }

    pub async fn is_failed(&self, token: &JobToken) -> Result<bool> {
        Ok(self.status(token).await? == Some(JobStatus::Failed))
    }

    pub async fn is_complete(&self, token: &JobToken) -> Result<bool> {
        Ok(self.status(token).await? == Some(JobStatus::Complete))
    }

    // ---- worker registry ----

    /// Raw identities in the live-worker set.
    pub async fn all_workers(&self) -> Result<Vec<String>> {
        Ok(self.store.set_members(&self.keys.workers()).await?)
    }

    pub async fn register_worker(&self, worker: &WorkerIdentity) -> Result<()> {
        self.store
            .set_add(&self.keys.workers(), &worker.to_string())
            .await?;
        self.store
            .set(
                &self.keys.worker_started(worker),
                &self.clock.now().to_rfc3339(),
            )
            .await?;
        info!(%worker, "worker registered");
        Ok(())
    }

    /// Drop the worker and everything kept under its identity.
    pub async fn unregister_worker(&self, worker: &WorkerIdentity) -> Result<()> {
        self.store
            .set_remove(&self.keys.workers(), &worker.to_string())
            .await?;
        for key in [
            self.keys.worker(worker),
            self.keys.worker_started(worker),
            self.keys.worker_stat("processed", worker),
            self.keys.worker_stat("failed", worker),
        ] {
            self.store.delete(&key).await?;
        }
        info!(%worker, "worker unregistered");
        Ok(())
    }

    /// Write the heartbeat for `worker`, overwriting the previous one.
    pub async fn working_on(&self, worker: &WorkerIdentity, job: &JobRecord) -> Result<()> {
        let heartbeat = Heartbeat {
            queue: job.queue().to_string(),
            run_at: self.clock.now(),
            payload: job.payload().clone(),
        };
        self.store
            .set(&self.keys.worker(worker), &serde_json::to_string(&heartbeat)?)
            .await?;
        Ok(())
    }

    pub async fn heartbeat(&self, worker: &WorkerIdentity) -> Result<Option<Heartbeat>> {
        match self.store.get(&self.keys.worker(worker)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Clear the heartbeat and count one processed job.
    pub async fn done_working(&self, worker: &WorkerIdentity) -> Result<()> {
        self.store.delete(&self.keys.worker(worker)).await?;
        self.store.incr(&self.keys.stat("processed"), 1).await?;
        self.store
            .incr(&self.keys.worker_stat("processed", worker), 1)
            .await?;
        Ok(())
    }

    pub(crate) async fn count_failure(&self, worker: &WorkerIdentity) -> Result<()> {
        self.store.incr(&self.keys.stat("failed"), 1).await?;
        self.store
            .incr(&self.keys.worker_stat("failed", worker), 1)
            .await?;
        Ok(())
    }

    // ---- failures and stats ----

    pub fn failure_recorder(&self) -> FailureRecorder {
        FailureRecorder::new(
            Arc::clone(&self.store),
            self.keys.failed(),
            Arc::clone(&self.clock),
        )
    }

    /// Up to `count` failure records, oldest first, starting at `start`.
    pub async fn failures(&self, start: usize, count: usize) -> Result<Vec<FailureRecord>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = (start + count - 1) as isize;
        self.store
            .list_range(&self.keys.failed(), start as isize, stop)
            .await?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(ResqError::from))
            .collect()
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats {
            processed: self.counter(&self.keys.stat("processed")).await?,
            failed: self.counter(&self.keys.stat("failed")).await?,
            workers: self.all_workers().await?.len(),
            failure_log: self.store.list_len(&self.keys.failed()).await?,
            ..QueueStats::default()
        };
        for queue in self.store.set_members(&self.keys.queues()).await? {
            let len = self.store.list_len(&self.keys.queue(&queue)).await?;
            stats.queues.insert(queue, len);
        }
        Ok(stats)
    }

    pub async fn worker_counter(&self, name: &str, worker: &WorkerIdentity) -> Result<u64> {
        self.counter(&self.keys.worker_stat(name, worker)).await
    }

    // ---- helpers ----

    async fn push_payload(&self, queue: &str, payload: &JobPayload, track: bool) -> Result<()> {
        self.store.set_add(&self.keys.queues(), queue).await?;
        self.store
            .push(&self.keys.queue(queue), &payload.to_json()?)
            .await?;
        if track {
            self.create_status(&payload.id).await?;
        }
        Ok(())
    }

    /// Start a fresh Waiting lifecycle for `token`.
    async fn create_status(&self, token: &JobToken) -> Result<()> {
        let record = StatusRecord::new(JobStatus::Waiting, self.clock.now());
        self.store
            .set(&self.keys.status(token), &serde_json::to_string(&record)?)
            .await?;
        Ok(())
    }

    /// Failure-log an entry that is not a valid payload. When even that
    /// fails, the raw text only survives in the error log.
    async fn record_undecodable(&self, raw: &str, reason: &str, source: &str) {
        let recorded = self
            .failure_recorder()
            .record_undecodable(self.ids.generate_token(), raw, reason, source)
            .await;
        if let Err(e) = recorded {
            error!(error = %e, source, raw, "undecodable job could not be recorded");
        }
    }

    async fn counter(&self, key: &str) -> Result<u64> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    fn scheduler(&self) -> Result<&Arc<dyn Scheduler>> {
        self.scheduler.as_ref().ok_or(ResqError::SchedulerUnavailable)
    }

    fn due_in(&self, delay: Duration) -> Result<DateTime<Utc>> {
        let delta = chrono::Duration::from_std(delay).map_err(|_| ResqError::InvalidDelay(delay))?;
        self.clock
            .now()
            .checked_add_signed(delta)
            .ok_or(ResqError::InvalidDelay(delay))
    }
}
