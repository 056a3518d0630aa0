//! Worker side: the per-process lifecycle and its poll loop.

pub mod daemon;
mod process;

pub use daemon::StopReason;
pub use process::{ProcessOutcome, WorkerProcess};
