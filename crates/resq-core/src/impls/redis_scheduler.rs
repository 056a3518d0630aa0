//! Redis-backed `Scheduler`.
//!
//! Delayed jobs live in one sorted set scored by their due time (unix
//! seconds). Promotion reads the due range and claims each member with
//! ZREM: only the caller whose ZREM removed the member gets the job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::ports::{DueJob, ScheduledJob, Scheduler, StoreError};

/// Sorted-set member. The nonce keeps identical jobs scheduled twice from
/// collapsing into one member.
#[derive(Serialize, Deserialize)]
struct ScheduledEntry {
    nonce: String,
    #[serde(flatten)]
    job: ScheduledJob,
}

#[derive(Clone)]
pub struct RedisScheduler {
    redis: ConnectionManager,
    schedule_key: String,
}

impl RedisScheduler {
    pub fn new(redis: ConnectionManager, schedule_key: impl Into<String>) -> Self {
        Self {
            redis,
            schedule_key: schedule_key.into(),
        }
    }
}

#[async_trait]
impl Scheduler for RedisScheduler {
    async fn enqueue_at(&self, at: DateTime<Utc>, job: ScheduledJob) -> Result<(), StoreError> {
        let entry = ScheduledEntry {
            nonce: Ulid::new().to_string(),
            job,
        };
        let member = serde_json::to_string(&entry)
            .map_err(|e| StoreError::OperationFailed(format!("encode scheduled job: {e}")))?;
        let mut conn = self.redis.clone();
        conn.zadd::<_, _, _, ()>(&self.schedule_key, member, at.timestamp())
            .await?;
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DueJob>, StoreError> {
        let mut conn = self.redis.clone();
        let members: Vec<String> = conn
            .zrangebyscore(&self.schedule_key, "-inf", now.timestamp())
            .await?;

        let mut due = Vec::with_capacity(members.len());
        for member in members {
            // entries already claimed must reach the caller
            let removed: i64 = match conn.zrem(&self.schedule_key, &member).await {
                Ok(removed) => removed,
                Err(e) if due.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, claimed = due.len(), "claiming scheduled jobs interrupted");
                    break;
                }
            };
            if removed == 0 {
                // another worker promoted it first
                continue;
            }
            match serde_json::from_str::<ScheduledEntry>(&member) {
                Ok(entry) => due.push(DueJob::Ready(entry.job)),
                Err(e) => {
                    warn!(error = %e, "claimed an undecodable scheduled job");
                    due.push(DueJob::Undecodable {
                        raw: member,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(due)
    }
}
