//! Task payloads handed to execution channels.

use serde::{Deserialize, Serialize};

/// Derived task for one event: the canonical payload plus receipt time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Canonical payload serialized as JSON.
    pub json_payload: String,
    /// Receipt time in whole seconds since the Unix epoch.
    pub timestamp: i64,
}

impl TaskPayload {
    /// Stamp `canonical` with the current time.
    #[must_use]
    pub fn received_now(canonical: &serde_json::Value) -> Self {
        Self::received_at(canonical, chrono::Utc::now().timestamp())
    }

    #[must_use]
    pub fn received_at(canonical: &serde_json::Value, timestamp: i64) -> Self {
        Self {
            json_payload: canonical.to_string(),
            timestamp,
        }
    }
}

/// Scheduling hint passed to job admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineHint {
    /// Run as soon as admission allows; no deferral window.
    Immediate,
}

/// A job submitted to the job-admission subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub task_id: i32,
    pub payload: TaskPayload,
    pub deadline: DeadlineHint,
}

impl ScheduledJob {
    /// A job with a random id and an immediate deadline.
    #[must_use]
    pub fn immediate(payload: TaskPayload) -> Self {
        Self {
            task_id: rand::random(),
            payload,
            deadline: DeadlineHint::Immediate,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn payload_is_compact_json() {
        let task = TaskPayload::received_at(&json!({"alert": "hi"}), 1_700_000_000);
        assert_eq!(task.json_payload, r#"{"alert":"hi"}"#);
        assert_eq!(task.timestamp, 1_700_000_000);
    }

    #[test]
    fn received_now_uses_whole_seconds() {
        let before = chrono::Utc::now().timestamp();
        let task = TaskPayload::received_now(&json!({}));
        let after = chrono::Utc::now().timestamp();
        assert!((before..=after).contains(&task.timestamp));
    }

    #[test]
    fn immediate_job_has_immediate_deadline() {
        let task = TaskPayload::received_at(&json!({}), 0);
        let job = ScheduledJob::immediate(task.clone());
        assert_eq!(job.deadline, DeadlineHint::Immediate);
        assert_eq!(job.payload, task);
    }
}
