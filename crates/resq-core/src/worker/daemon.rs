use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::WorkerProcess;
use crate::config::WorkerOptions;
use crate::error::Result;
use crate::job::JobRecord;

/// Why the poll loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    MemoryExceeded,
}

/// Poll loop driving `WorkerProcess::process`.
/// - queues are checked in the worker's order, first non-empty wins
/// - due scheduled jobs are promoted before each pass
/// - job errors are logged, the loop goes on
/// - shutdown is seen between jobs and while sleeping; a running job is never cut short
pub async fn run(
    worker: &mut WorkerProcess,
    options: &WorkerOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<StopReason> {
    let queues = worker.queues();

    loop {
        if *shutdown.borrow() {
            return Ok(StopReason::Shutdown);
        }

        if let Err(e) = worker.connection().promote_scheduled().await {
            warn!(error = %e, "promoting scheduled jobs failed");
        }

        match next_job(worker, &queues).await {
            Ok(Some(job)) => {
                let token = job.token().clone();
                match worker.process(job, options.max_tries, options.delay).await {
                    Ok(outcome) if outcome.failed => {
                        warn!(%token, job = outcome.job.job_name(), "job failed permanently")
                    }
                    Ok(_) => debug!(%token, "job processed"),
                    Err(e) => error!(%token, error = %e, "job raised an error"),
                }
            }
            Ok(None) => {
                if idle(&mut shutdown, options.sleep).await {
                    return Ok(StopReason::Shutdown);
                }
            }
            Err(e) => {
                error!(error = %e, "reserving a job failed");
                if idle(&mut shutdown, options.sleep).await {
                    return Ok(StopReason::Shutdown);
                }
            }
        }

        if let Some(used) = worker.processes().resident_memory_mb() {
            if used > options.memory_mb {
                warn!(used_mb = used, limit_mb = options.memory_mb, "memory limit exceeded");
                return Ok(StopReason::MemoryExceeded);
            }
        }
    }
}

/// Sleep unless shutdown comes first. A dropped sender counts as shutdown.
async fn idle(shutdown: &mut watch::Receiver<bool>, sleep: std::time::Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        _ = tokio::time::sleep(sleep) => false,
    }
}

async fn next_job(worker: &WorkerProcess, queues: &[String]) -> Result<Option<JobRecord>> {
    for queue in queues {
        if let Some(job) = worker.connection().pop(Some(queue)).await? {
            return Ok(Some(job));
        }
    }
    Ok(None)
}
