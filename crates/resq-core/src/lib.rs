//! resq-core
//!
//! A Resque-compatible job queue on a shared Redis store.
//!
//! # Modules
//! - **domain**: payloads, tokens, statuses, worker identities, failure records, events
//! - **ports**: seams to the outside (JobStore, Scheduler, Clock, IdGenerator, ProcessTable, EventSink)
//! - **impls**: Redis and in-memory implementations of the ports
//! - **queue**: `QueueConnection`, the store-facing API (enqueue, reserve, release, status, registry)
//! - **job**: `JobRecord`, handlers, failure recording
//! - **worker**: `WorkerProcess` and its poll loop
//! - **config** / **connector**: environment configuration and connection setup
//! - **observability**: stats views

pub mod config;
pub mod connector;
pub mod domain;
pub mod error;
pub mod impls;
pub mod job;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod worker;

pub use config::{ResqConfig, WorkerOptions};
pub use domain::{JobPayload, JobStatus, JobToken, WorkerIdentity};
pub use error::{JobError, ResqError, Result};
pub use job::{HandlerRegistry, JobHandler, JobRecord};
pub use observability::QueueStats;
pub use queue::QueueConnection;
pub use worker::{ProcessOutcome, StopReason, WorkerProcess};
