//! Store key layout.

use crate::domain::{JobToken, WorkerIdentity};

pub const DEFAULT_NAMESPACE: &str = "resque";

/// Builds every key the queue touches, all under one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, suffix: impl std::fmt::Display) -> String {
        format!("{}:{suffix}", self.namespace)
    }

    /// Set of every queue name ever pushed to.
    pub fn queues(&self) -> String {
        self.key("queues")
    }

    pub fn queue(&self, queue: &str) -> String {
        self.key(format_args!("queue:{queue}"))
    }

    pub fn status(&self, token: &JobToken) -> String {
        self.key(format_args!("job:{token}:status"))
    }

    pub fn workers(&self) -> String {
        self.key("workers")
    }

    /// Heartbeat of a busy worker.
    pub fn worker(&self, worker: &WorkerIdentity) -> String {
        self.key(format_args!("worker:{worker}"))
    }

    pub fn worker_started(&self, worker: &WorkerIdentity) -> String {
        self.key(format_args!("worker:{worker}:started"))
    }

    /// Global counter (`processed`, `failed`).
    pub fn stat(&self, name: &str) -> String {
        self.key(format_args!("stat:{name}"))
    }

    pub fn worker_stat(&self, name: &str, worker: &WorkerIdentity) -> String {
        self.key(format_args!("stat:{name}:{worker}"))
    }

    pub fn failed(&self) -> String {
        self.key("failed")
    }

    pub fn delayed_schedule(&self) -> String {
        self.key("delayed_queue_schedule")
    }
}
