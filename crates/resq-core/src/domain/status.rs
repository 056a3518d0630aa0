//! Tracked job status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status as stored per token.
///
/// State transitions:
/// - Waiting -> Running -> Complete
/// - Waiting -> Running -> Failed
/// - a released job starts over at Waiting
///
/// Stored as the numeric codes resque front-ends expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JobStatus {
    Waiting,
    Running,
    Failed,
    Complete,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Waiting => 1,
            JobStatus::Running => 2,
            JobStatus::Failed => 3,
            JobStatus::Complete => 4,
        }
    }

    /// Complete or Failed: the token may be reused by a new enqueue.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl From<JobStatus> for u8 {
    fn from(status: JobStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(JobStatus::Waiting),
            2 => Ok(JobStatus::Running),
            3 => Ok(JobStatus::Failed),
            4 => Ok(JobStatus::Complete),
            other => Err(format!("unknown job status code {other}")),
        }
    }
}

/// The value stored under a token's status key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    pub updated: DateTime<Utc>,
    pub started: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(status: JobStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            updated: now,
            started: now,
        }
    }

    /// Move to `status`, keeping the original start time.
    pub fn transition(&mut self, status: JobStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(JobStatus::Waiting, 1)]
    #[case(JobStatus::Running, 2)]
    #[case(JobStatus::Failed, 3)]
    #[case(JobStatus::Complete, 4)]
    fn status_codes_match_resque(#[case] status: JobStatus, #[case] code: u8) {
        assert_eq!(status.code(), code);
        assert_eq!(JobStatus::try_from(code), Ok(status));
    }

    #[test]
    fn unknown_code_is_rejected() {
        let parsed: Result<JobStatus, _> = serde_json::from_str("9");
        assert!(parsed.is_err());
    }

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
    }

    #[test]
    fn transition_keeps_start_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 5).unwrap();
        let mut record = StatusRecord::new(JobStatus::Waiting, t0);
        record.transition(JobStatus::Running, t1);

        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.started, t0);
        assert_eq!(record.updated, t1);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], 2);
    }
}
