//! Impls - implementations of the ports.
//!
//! # Included
//! - **RedisJobStore / RedisScheduler**: production store and delayed-job backend
//! - **InMemoryJobStore / InMemoryScheduler**: development and tests
//! - **SystemProcessTable**: `ps`-based process inspection
//! - event sinks for logging and tests

pub mod event_sinks;
#[cfg(test)]
pub(crate) mod faulty_store;
pub mod inmem_scheduler;
pub mod inmem_store;
pub mod redis_scheduler;
pub mod redis_store;
pub mod system_process;

pub use self::event_sinks::{NoopEventSink, RecordingEventSink, TracingEventSink};
#[cfg(test)]
pub(crate) use self::faulty_store::FaultyJobStore;
pub use self::inmem_scheduler::InMemoryScheduler;
pub use self::inmem_store::InMemoryJobStore;
pub use self::redis_scheduler::RedisScheduler;
pub use self::redis_store::RedisJobStore;
pub use self::system_process::{StaticProcessTable, SystemProcessTable};
