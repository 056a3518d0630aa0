//! Ports - the seams to everything outside the queue core.
//!
//! Each trait is a small interface listing only what the core calls.
//! Implementations live in `impls`.

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod job_store;
pub mod process_table;
pub mod scheduler;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, EventSinks};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobStore, StoreError};
pub use self::process_table::ProcessTable;
pub use self::scheduler::{DueJob, ScheduledJob, Scheduler};
