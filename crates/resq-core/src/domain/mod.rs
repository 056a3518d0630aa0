//! Domain model: payloads, tokens, statuses, worker identities, failure records.

pub mod events;
pub mod failure;
pub mod ids;
pub mod payload;
pub mod status;
pub mod worker_id;

pub use self::events::JobEvent;
pub use self::failure::{FailureRecord, Heartbeat};
pub use self::ids::JobToken;
pub use self::payload::{JobArguments, JobPayload};
pub use self::status::{JobStatus, StatusRecord};
pub use self::worker_id::WorkerIdentity;
