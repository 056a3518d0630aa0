//! Job execution: the reserved job, its handlers, failure bookkeeping.

mod failure;
mod handler;
mod record;

pub use failure::{FailureRecorder, UNDECODABLE_JOB};
pub use handler::{HandlerRegistry, JobHandler};
pub use record::JobRecord;
