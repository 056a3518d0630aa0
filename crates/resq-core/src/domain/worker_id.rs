//! Worker identity (`hostname:pid:queues`).

use std::fmt;
use std::str::FromStr;

use crate::error::ResqError;

/// Identifies one worker process in the registry.
///
/// Serialized as `hostname:pid:queues`. The queue spec is the raw
/// comma-separated list the worker was started with and may itself contain
/// `:`, so parsing splits into at most three parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity {
    hostname: String,
    pid: u32,
    queues: String,
}

impl WorkerIdentity {
    pub fn new(hostname: impl Into<String>, pid: u32, queues: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
            queues: queues.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn queues(&self) -> &str {
        &self.queues
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.hostname, self.pid, self.queues)
    }
}

impl FromStr for WorkerIdentity {
    type Err = ResqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let hostname = parts.next().filter(|h| !h.is_empty());
        let pid = parts.next().and_then(|p| p.parse::<u32>().ok());
        let queues = parts.next();

        match (hostname, pid, queues) {
            (Some(hostname), Some(pid), Some(queues)) => Ok(Self::new(hostname, pid, queues)),
            _ => Err(ResqError::InvalidWorkerId(s.to_string())),
        }
    }
}
