use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::JobToken;
use crate::ports::StoreError;

#[derive(Debug, Error)]
pub enum ResqError {
    #[error("{0} is not implemented for resque")]
    NotImplemented(&'static str),

    #[error("no scheduler backend configured; delayed jobs are unavailable")]
    SchedulerUnavailable,

    #[error("job execution failed: {0}")]
    ExecutionFailure(#[from] JobError),

    #[error("job {token} exceeded its retry budget ({attempts} > {max_attempts})")]
    RetryBudgetExceeded {
        token: JobToken,
        attempts: u32,
        max_attempts: u32,
    },

    #[error("handler not found for job={0}")]
    HandlerNotFound(String),

    #[error("duplicate handler for job={0}")]
    DuplicateHandler(String),

    #[error("invalid worker identity: {0}")]
    InvalidWorkerId(String),

    #[error("delay out of range: {0:?}")]
    InvalidDelay(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ResqError>;

/// Structured failure raised by a job body.
///
/// This is what ends up in the failure log, so it keeps the pieces a
/// reader of that log needs: an error type name, the message, and the
/// chain of causes as backtrace lines.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct JobError {
    kind: String,
    message: String,
    #[serde(default)]
    backtrace: Vec<String>,
}

impl JobError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Capture any error value. The kind is the short type name and the
    /// backtrace is the `source()` chain.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let kind = short_type_name(std::any::type_name::<E>());
        let mut backtrace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            backtrace.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            kind,
            message: err.to_string(),
            backtrace,
        }
    }

    pub fn with_backtrace(mut self, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.backtrace = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &[String] {
        &self.backtrace
    }
}

impl ResqError {
    /// The `JobError` this failure should be recorded as.
    pub fn to_job_error(&self) -> JobError {
        match self {
            ResqError::ExecutionFailure(err) => err.clone(),
            ResqError::RetryBudgetExceeded { .. } => {
                JobError::new("RetryBudgetExceeded", self.to_string())
            }
            ResqError::HandlerNotFound(_) => JobError::new("HandlerNotFound", self.to_string()),
            other => JobError::from_error(other),
        }
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("smtp refused")]
    struct SmtpError {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn from_error_keeps_type_and_cause_chain() {
        let err = SmtpError {
            inner: std::io::Error::other("connection reset"),
        };
        let job_err = JobError::from_error(&err);

        assert_eq!(job_err.kind(), "SmtpError");
        assert_eq!(job_err.message(), "smtp refused");
        assert_eq!(job_err.backtrace(), ["caused by: connection reset"]);
    }

    #[test]
    fn budget_exceeded_is_recorded_under_its_own_kind() {
        let err = ResqError::RetryBudgetExceeded {
            token: JobToken::new("t-1"),
            attempts: 4,
            max_attempts: 3,
        };
        let job_err = err.to_job_error();
        assert_eq!(job_err.kind(), "RetryBudgetExceeded");
        assert!(job_err.message().contains("4 > 3"));
    }

    #[test]
    fn execution_failure_unwraps_to_the_original_job_error() {
        let original = JobError::new("Timeout", "upstream took too long");
        let err = ResqError::from(original.clone());
        assert_eq!(err.to_job_error(), original);
    }
}
