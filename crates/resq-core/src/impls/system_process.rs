//! Process tables: the real one (via `ps`) and a fixed one for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::process::Command;

use crate::ports::ProcessTable;

/// Reads the host's process list with `ps -A -o pid,command` and keeps the
/// lines that run `worker_command` (see `is_worker_command`).
pub struct SystemProcessTable {
    worker_command: String,
}

impl SystemProcessTable {
    pub fn new(worker_command: impl Into<String>) -> Self {
        Self {
            worker_command: worker_command.into(),
        }
    }
}

#[async_trait]
impl ProcessTable for SystemProcessTable {
    fn hostname(&self) -> String {
        if let Ok(name) = std::env::var("HOSTNAME") {
            if !name.trim().is_empty() {
                return name.trim().to_string();
            }
        }
        std::fs::read_to_string("/proc/sys/kernel/hostname")
            .or_else(|_| std::fs::read_to_string("/etc/hostname"))
            .map(|name| name.trim().to_string())
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    fn current_pid(&self) -> u32 {
        std::process::id()
    }

    async fn worker_pids(&self) -> std::io::Result<HashSet<u32>> {
        let output = Command::new("ps")
            .args(["-A", "-o", "pid,command"])
            .output()
            .await?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!("ps exited with {}", output.status)));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(parse_worker_pids(&listing, &self.worker_command))
    }

    fn resident_memory_mb(&self) -> Option<u64> {
        // second field of statm is resident pages
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(pages * 4096 / (1024 * 1024))
    }
}

fn parse_worker_pids(listing: &str, worker_command: &str) -> HashSet<u32> {
    listing
        .lines()
        .filter_map(|line| {
            let (pid, command) = line.trim().split_once(char::is_whitespace)?;
            let pid = pid.parse().ok()?;
            is_worker_command(command, worker_command).then_some(pid)
        })
        .collect()
}

/// `worker_command` is a binary followed by subcommand words, e.g.
/// `resq work`. A command matches when it runs a binary with the same file
/// name and every remaining word shows up after it, in order. Options in
/// between (`resq --log-level debug work`) are skipped.
fn is_worker_command(command: &str, worker_command: &str) -> bool {
    let mut wanted = worker_command.split_whitespace();
    let Some(binary) = wanted.next().map(file_name) else {
        return false;
    };
    let mut words = command
        .split_whitespace()
        .skip_while(|word| file_name(word) != binary);
    if words.next().is_none() {
        return false;
    }
    wanted.all(|want| words.any(|word| word == want))
}

fn file_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

/// A process table with fixed answers.
#[derive(Debug, Clone)]
pub struct StaticProcessTable {
    pub hostname: String,
    pub pid: u32,
    pub worker_pids: HashSet<u32>,
    pub resident_memory_mb: Option<u64>,
}

impl StaticProcessTable {
    pub fn new(hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
            worker_pids: HashSet::from([pid]),
            resident_memory_mb: None,
        }
    }

    pub fn with_worker_pids(mut self, pids: impl IntoIterator<Item = u32>) -> Self {
        self.worker_pids.extend(pids);
        self
    }

    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.resident_memory_mb = Some(mb);
        self
    }
}

#[async_trait]
impl ProcessTable for StaticProcessTable {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn current_pid(&self) -> u32 {
        self.pid
    }

    async fn worker_pids(&self) -> std::io::Result<HashSet<u32>> {
        Ok(self.worker_pids.clone())
    }

    fn resident_memory_mb(&self) -> Option<u64> {
        self.resident_memory_mb
    }
}
