//! Job payload: what sits in a queue list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::JobToken;

/// Ordered argument mapping handed to the job handler.
pub type JobArguments = Map<String, Value>;

/// Key under which producers may smuggle a serialized command in `data`.
const COMMAND_KEY: &str = "command";

/// Serialized description of one unit of work.
///
/// `attempts` starts at 1 and only grows; the failure recorder is the one
/// place that resets it (keeping the old value in `failed_attempts`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job: String,
    pub id: JobToken,
    #[serde(default = "first_attempt")]
    pub attempts: u32,
    #[serde(default)]
    pub data: JobArguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_attempts: Option<u32>,
}

fn first_attempt() -> u32 {
    1
}

impl JobPayload {
    /// Build a fresh payload from producer data.
    ///
    /// - an object becomes the argument mapping as-is
    /// - `null` means no arguments
    /// - anything else is kept under a single `data` argument
    ///
    /// A string `command` argument is lifted out into `command`.
    pub fn new(job: impl Into<String>, id: JobToken, data: Value) -> Self {
        let mut arguments = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        let command = match arguments.get(COMMAND_KEY) {
            Some(Value::String(_)) => match arguments.shift_remove(COMMAND_KEY) {
                Some(Value::String(command)) => Some(command),
                _ => None,
            },
            _ => None,
        };

        Self {
            job: job.into(),
            id,
            attempts: 1,
            data: arguments,
            command,
            failed_attempts: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn new_payload_starts_at_first_attempt() {
        let payload = JobPayload::new("SendEmail", JobToken::new("t1"), json!({"to": "a@b.com"}));
        assert_eq!(payload.attempts(), 1);
        assert_eq!(payload.data["to"], "a@b.com");
        assert!(payload.command.is_none());
    }

    #[test]
    fn command_is_lifted_out_of_arguments() {
        let payload = JobPayload::new(
            "CallQueuedHandler",
            JobToken::new("t1"),
            json!({"command": "O:8:\"SendMail\":0:{}", "user": 7}),
        );
        assert_eq!(payload.command.as_deref(), Some("O:8:\"SendMail\":0:{}"));
        assert!(!payload.data.contains_key("command"));
        assert_eq!(payload.data["user"], 7);
    }

    #[rstest]
    #[case::null(json!(null), 0)]
    #[case::scalar(json!(42), 1)]
    #[case::list(json!([1, 2]), 1)]
    fn non_object_data_is_normalized(#[case] data: Value, #[case] expected_len: usize) {
        let payload = JobPayload::new("Job", JobToken::new("t1"), data);
        assert_eq!(payload.data.len(), expected_len);
    }

    #[test]
    fn argument_order_is_preserved() {
        let payload = JobPayload::new(
            "Job",
            JobToken::new("t1"),
            json!({"zeta": 1, "alpha": 2, "mid": 3}),
        );
        let raw = payload.to_json().unwrap();
        let back = JobPayload::from_json(&raw).unwrap();
        let keys: Vec<_> = back.data.keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn missing_attempts_default_to_one() {
        let back = JobPayload::from_json(r#"{"job":"Job","id":"t1"}"#).unwrap();
        assert_eq!(back.attempts(), 1);
        assert!(back.data.is_empty());
    }
}
