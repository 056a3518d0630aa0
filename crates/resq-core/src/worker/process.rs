//! WorkerProcess - one worker's registration, processing and cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::daemon::{self, StopReason};
use crate::config::WorkerOptions;
use crate::domain::{JobEvent, JobToken, WorkerIdentity};
use crate::error::{JobError, ResqError, Result};
use crate::job::{HandlerRegistry, JobRecord};
use crate::ports::ProcessTable;
use crate::queue::QueueConnection;

/// What `process` did with a job.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub job: JobRecord,
    /// The job was over its retry budget and went to the failure log.
    pub failed: bool,
}

/// Lifecycle:
/// - `init`: identity, pruning of dead registry entries
/// - `start`: register, run the poll loop, unregister
/// - the loop calls `process` once per reserved job
pub struct WorkerProcess {
    connection: Arc<QueueConnection>,
    handlers: Arc<HandlerRegistry>,
    processes: Arc<dyn ProcessTable>,
    identity: WorkerIdentity,
    last_error: Option<(JobToken, JobError)>,
}

impl WorkerProcess {
    /// Identify as `hostname:pid:queue_spec` and prune workers that died
    /// without unregistering.
    pub async fn init(
        connection: Arc<QueueConnection>,
        handlers: Arc<HandlerRegistry>,
        processes: Arc<dyn ProcessTable>,
        queue_spec: &str,
    ) -> Result<Self> {
        let queue_spec = if queue_spec.trim().is_empty() {
            connection.default_queue().to_string()
        } else {
            queue_spec.trim().to_string()
        };
        let identity = WorkerIdentity::new(processes.hostname(), processes.current_pid(), queue_spec);
        let worker = Self {
            connection,
            handlers,
            processes,
            identity,
            last_error: None,
        };
        let pruned = worker.prune_dead_workers().await?;
        debug!(worker = %worker.identity, pruned, "worker initialized");
        Ok(worker)
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn connection(&self) -> &Arc<QueueConnection> {
        &self.connection
    }

    pub(crate) fn processes(&self) -> &dyn ProcessTable {
        self.processes.as_ref()
    }

    /// Queues to poll, in priority order.
    pub fn queues(&self) -> Vec<String> {
        self.identity
            .queues()
            .split(',')
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Register, run the poll loop until shutdown, then unregister.
    pub async fn start(
        &mut self,
        options: &WorkerOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Result<StopReason> {
        self.connection.register_worker(&self.identity).await?;
        let result = daemon::run(self, options, shutdown).await;
        self.stop().await?;
        let reason = result?;
        info!(worker = %self.identity, ?reason, "worker stopped");
        Ok(reason)
    }

    /// Run one reserved job.
    ///
    /// - over budget (`max_attempts > 0 && attempts > max_attempts`): the
    ///   job is failed without running and `failed` is true
    /// - success: heartbeat cleared, `failed` is false
    /// - error, including a failed heartbeat write: the job is released
    ///   (unless it deleted itself), the heartbeat is cleared, and the
    ///   error is returned
    pub async fn process(
        &mut self,
        mut job: JobRecord,
        max_attempts: u32,
        delay: Duration,
    ) -> Result<ProcessOutcome> {
        if max_attempts > 0 && job.attempts() > max_attempts {
            self.log_failed_job(&mut job, max_attempts).await?;
            return Ok(ProcessOutcome { job, failed: true });
        }

        let ran = match self.connection.working_on(&self.identity, &job).await {
            Ok(()) => job.fire(&self.handlers).await,
            Err(e) => Err(e),
        };

        match ran {
            Ok(()) => {
                self.connection.done_working(&self.identity).await?;
                Ok(ProcessOutcome { job, failed: false })
            }
            Err(err) => {
                self.last_error = Some((job.token().clone(), err.to_job_error()));
                if !job.is_deleted() {
                    if let Err(e) = job.release(delay).await {
                        error!(
                            token = %job.token(),
                            error = %e,
                            payload = ?job.payload().to_json().ok(),
                            "releasing failed job"
                        );
                    }
                }
                if let Err(e) = self.connection.done_working(&self.identity).await {
                    warn!(worker = %self.identity, error = %e, "clearing heartbeat failed");
                }
                Err(err)
            }
        }
    }

    /// Consume the job and record it as failed.
    ///
    /// The recorded error is the last one this worker saw for the same job,
    /// or a retry-budget error when there is none.
    pub async fn log_failed_job(&mut self, job: &mut JobRecord, max_attempts: u32) -> Result<()> {
        job.delete();

        let error = match self.last_error.take() {
            Some((token, error)) if &token == job.token() => error,
            _ => ResqError::RetryBudgetExceeded {
                token: job.token().clone(),
                attempts: job.attempts(),
                max_attempts,
            }
            .to_job_error(),
        };
        job.has_failed(&error, &self.identity).await?;

        let worker = self.identity.to_string();
        self.connection.events().emit(&JobEvent::FailedJobNotification {
            job: job.job_name(),
            token: job.token(),
            queue: job.queue(),
            worker: &worker,
        });
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.connection.unregister_worker(&self.identity).await
    }

    /// Unregister registry entries of this host whose pid is no longer a
    /// running worker. Returns how many were removed.
    ///
    /// Without a process list nothing can be proven dead, so nothing is
    /// pruned.
    pub async fn prune_dead_workers(&self) -> Result<usize> {
        let hostname = self.processes.hostname();
        let own_pid = self.processes.current_pid();
        let alive = match self.processes.worker_pids().await {
            Ok(alive) => alive,
            Err(e) => {
                warn!(error = %e, "process list unavailable, skipping dead worker pruning");
                return Ok(0);
            }
        };

        let mut pruned = 0;
        for raw in self.connection.all_workers().await? {
            let worker: WorkerIdentity = match raw.parse() {
                Ok(worker) => worker,
                Err(e) => {
                    warn!(error = %e, "skipping unparseable worker entry");
                    continue;
                }
            };
            if worker.hostname() != hostname
                || worker.pid() == own_pid
                || alive.contains(&worker.pid())
            {
                continue;
            }
            info!(%worker, "pruning dead worker");
            self.connection.unregister_worker(&worker).await?;
            pruned += 1;
        }
        Ok(pruned)
    }
}
