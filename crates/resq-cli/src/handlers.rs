//! Built-in job handlers shipped with the binary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use resq_core::{HandlerRegistry, JobError, JobHandler, JobRecord, ResqError};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

/// `Hello {"name": ...}`: logs a greeting.
pub struct HelloHandler;

#[async_trait]
impl JobHandler for HelloHandler {
    async fn perform(&self, job: &mut JobRecord) -> Result<(), JobError> {
        let payload: HelloPayload = decode(job)?;
        info!(token = %job.token(), attempts = job.attempts(), "Hello, {}!", payload.name);
        Ok(())
    }
}

/// `Flaky`: fails its first `n` runs across the process, then succeeds.
pub struct FlakyHandler {
    remaining_failures: AtomicU32,
}

impl FlakyHandler {
    pub fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl JobHandler for FlakyHandler {
    async fn perform(&self, job: &mut JobRecord) -> Result<(), JobError> {
        let claimed = self
            .remaining_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1));
        if let Ok(left) = claimed {
            return Err(JobError::new(
                "IntentionalFailure",
                format!("intentional failure (left={left})"),
            ));
        }
        info!(token = %job.token(), attempts = job.attempts(), "flaky job succeeded");
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(job: &JobRecord) -> Result<T, JobError> {
    let arguments = serde_json::Value::Object(job.arguments().clone());
    serde_json::from_value(arguments).map_err(|e| JobError::from_error(&e))
}

pub fn registry() -> Result<HandlerRegistry, ResqError> {
    let mut reg = HandlerRegistry::new();
    reg.register("Hello", Arc::new(HelloHandler))?;
    reg.register("Flaky", Arc::new(FlakyHandler::new(2)))?;
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resq_core::QueueConnection;
    use resq_core::impls::InMemoryJobStore;
    use serde_json::json;

    async fn reserved(job: &str, data: serde_json::Value) -> JobRecord {
        let conn = Arc::new(QueueConnection::new(Arc::new(InMemoryJobStore::new())));
        conn.enqueue(job, data, Some("default"), false).await.unwrap();
        conn.pop(None).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn hello_needs_a_name() {
        let reg = registry().unwrap();
        let mut job = reserved("Hello", json!({"name": "resq"})).await;
        job.fire(&reg).await.unwrap();

        let mut job = reserved("Hello", json!({})).await;
        assert!(job.fire(&reg).await.is_err());
    }

    #[tokio::test]
    async fn flaky_fails_then_succeeds() {
        let handler = FlakyHandler::new(1);
        let mut job = reserved("Flaky", json!({})).await;
        let err = handler.perform(&mut job).await.unwrap_err();
        assert_eq!(err.kind(), "IntentionalFailure");
        handler.perform(&mut job).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn flaky_failures_are_shared_between_concurrent_runs() {
        let handler = Arc::new(FlakyHandler::new(3));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handler = Arc::clone(&handler);
            let mut job = reserved("Flaky", json!({})).await;
            tasks.push(tokio::spawn(async move { handler.perform(&mut job).await.is_err() }));
        }

        let mut failed = 0;
        for task in tasks {
            if task.await.unwrap() {
                failed += 1;
            }
        }
        assert_eq!(failed, 3);
        assert_eq!(handler.remaining_failures.load(Ordering::Acquire), 0);
    }
}
