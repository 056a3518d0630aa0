//! Queue module: the store-facing connection and its key layout.

mod connection;
mod keys;

pub use connection::{DEFAULT_QUEUE, QueueConnection};
pub use keys::{DEFAULT_NAMESPACE, KeySpace};
