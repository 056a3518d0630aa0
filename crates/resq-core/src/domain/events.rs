//! Lifecycle events emitted while jobs run.

use super::JobToken;
use crate::error::JobError;

/// Something observers may want to hear about.
///
/// Events borrow their data; sinks that need to keep them must copy.
#[derive(Debug, Clone, Copy)]
pub enum JobEvent<'a> {
    /// Status is Running, the handler is about to be called.
    BeforePerform {
        job: &'a str,
        token: &'a JobToken,
        queue: &'a str,
    },

    /// The handler returned successfully.
    AfterPerform {
        job: &'a str,
        token: &'a JobToken,
        queue: &'a str,
    },

    /// A failure record was written for the job.
    JobFailed {
        job: &'a str,
        token: &'a JobToken,
        queue: &'a str,
        error: &'a JobError,
    },

    /// A worker gave up on a job whose retry budget is spent.
    FailedJobNotification {
        job: &'a str,
        token: &'a JobToken,
        queue: &'a str,
        worker: &'a str,
    },
}

impl JobEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::BeforePerform { .. } => "beforePerform",
            JobEvent::AfterPerform { .. } => "afterPerform",
            JobEvent::JobFailed { .. } => "onFailure",
            JobEvent::FailedJobNotification { .. } => "failedJob",
        }
    }

    pub fn token(&self) -> &JobToken {
        match self {
            JobEvent::BeforePerform { token, .. }
            | JobEvent::AfterPerform { token, .. }
            | JobEvent::JobFailed { token, .. }
            | JobEvent::FailedJobNotification { token, .. } => token,
        }
    }
}
