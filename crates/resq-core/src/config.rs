//! Configuration from the environment.

use std::env;
use std::time::Duration;

use crate::queue::{DEFAULT_NAMESPACE, DEFAULT_QUEUE};

pub const DEFAULT_CONNECTION: &str = "default";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
pub const DEFAULT_WORKER_COMMAND: &str = "resq work";

/// Where the queue lives and how its keys are laid out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResqConfig {
    /// Connection name, used to pick `RESQ_<NAME>_REDIS_URL`.
    pub connection: String,
    /// Redis connection URL
    pub redis_url: String,
    /// Prefix of every key
    pub namespace: String,
    /// Queue used when a consumer names none
    pub default_queue: String,
    /// Enable delayed jobs (sorted-set scheduler)
    pub scheduler: bool,
    /// Binary and subcommand of worker processes, matched word by word
    /// against `ps` output
    pub worker_command: String,
}

impl ResqConfig {
    /// Load configuration for `connection` from environment variables
    /// (and `.env`, when present).
    pub fn from_env(connection: Option<&str>) -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(connection, |key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(connection: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let connection = connection.unwrap_or(DEFAULT_CONNECTION).to_string();
        let named_url = format!(
            "RESQ_{}_REDIS_URL",
            connection.to_ascii_uppercase().replace(['-', '.'], "_")
        );

        Self {
            redis_url: lookup(&named_url)
                .or_else(|| lookup("REDIS_URL"))
                .unwrap_or_else(|| String::from(DEFAULT_REDIS_URL)),
            namespace: lookup("RESQ_NAMESPACE").unwrap_or_else(|| String::from(DEFAULT_NAMESPACE)),
            default_queue: lookup("RESQ_DEFAULT_QUEUE")
                .unwrap_or_else(|| String::from(DEFAULT_QUEUE)),
            scheduler: lookup("RESQ_SCHEDULER")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(true),
            worker_command: lookup("RESQ_WORKER_COMMAND")
                .unwrap_or_else(|| String::from(DEFAULT_WORKER_COMMAND)),
            connection,
        }
    }
}

/// Poll loop parameters for one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Delay before a failed job becomes visible again.
    pub delay: Duration,
    /// Idle sleep when every queue is empty.
    pub sleep: Duration,
    /// Stop once resident memory goes above this many megabytes.
    pub memory_mb: u64,
    /// Attempts allowed per job, `0` for unlimited.
    pub max_tries: u32,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            sleep: Duration::from_secs(3),
            memory_mb: 128,
            max_tries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ResqConfig::from_lookup(None, lookup(&[]));
        assert_eq!(config.connection, "default");
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.namespace, "resque");
        assert_eq!(config.default_queue, "default");
        assert!(config.scheduler);
        assert_eq!(config.worker_command, "resq work");
    }

    #[test]
    fn named_connection_url_wins_over_redis_url() {
        let vars = lookup(&[
            ("REDIS_URL", "redis://shared/"),
            ("RESQ_BILLING_REDIS_URL", "redis://billing/"),
            ("RESQ_SCHEDULER", "off"),
        ]);
        let config = ResqConfig::from_lookup(Some("billing"), vars);
        assert_eq!(config.redis_url, "redis://billing/");
        assert!(!config.scheduler);

        let config = ResqConfig::from_lookup(Some("other"), lookup(&[("REDIS_URL", "redis://shared/")]));
        assert_eq!(config.redis_url, "redis://shared/");
    }
}
