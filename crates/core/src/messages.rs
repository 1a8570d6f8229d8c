//! Wire message types for the control plane and the work queue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::jobs::JobError;

/// Operation requested on a deposit.
///
/// Closed, stable set: dispatch is by exhaustive matching, and an unknown
/// action string is fatal for the carrying message at parse time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationAction {
    Register,
    Pause,
    Resume,
    Quiet,
    JobSuccess,
    JobFailure,
    JobInterrupted,
}

impl std::fmt::Display for OperationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationAction::Register => "REGISTER",
            OperationAction::Pause => "PAUSE",
            OperationAction::Resume => "RESUME",
            OperationAction::Quiet => "QUIET",
            OperationAction::JobSuccess => "JOB_SUCCESS",
            OperationAction::JobFailure => "JOB_FAILURE",
            OperationAction::JobInterrupted => "JOB_INTERRUPTED",
        };
        f.write_str(name)
    }
}

/// Control-plane message routed to exactly one operation handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationMessage {
    pub deposit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub action: OperationAction,
    pub username: String,
    /// Field-bag entries submitted with a REGISTER, opaque to the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
    /// Retained only for handler-side logging, never persisted on the deposit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_stack_trace: Option<String>,
}

impl OperationMessage {
    fn bare(deposit_id: &str, action: OperationAction, username: &str) -> Self {
        Self {
            deposit_id: deposit_id.to_string(),
            job_id: None,
            action,
            username: username.to_string(),
            additional_info: None,
            exception_class_name: None,
            exception_message: None,
            exception_stack_trace: None,
        }
    }

    pub fn register(
        deposit_id: &str,
        username: &str,
        additional_info: HashMap<String, String>,
    ) -> Self {
        Self {
            additional_info: Some(additional_info),
            ..Self::bare(deposit_id, OperationAction::Register, username)
        }
    }

    pub fn pause(deposit_id: &str, username: &str) -> Self {
        Self::bare(deposit_id, OperationAction::Pause, username)
    }

    pub fn resume(deposit_id: &str, username: &str) -> Self {
        Self::bare(deposit_id, OperationAction::Resume, username)
    }

    pub fn quiet(deposit_id: &str, username: &str) -> Self {
        Self::bare(deposit_id, OperationAction::Quiet, username)
    }

    pub fn job_success(deposit_id: &str, job_id: &str, username: &str) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            ..Self::bare(deposit_id, OperationAction::JobSuccess, username)
        }
    }

    pub fn job_failure(deposit_id: &str, job_id: &str, username: &str, error: &JobError) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            exception_class_name: Some(error.class_name().to_string()),
            exception_message: Some(error.to_string()),
            exception_stack_trace: Some(format!("{error:?}")),
            ..Self::bare(deposit_id, OperationAction::JobFailure, username)
        }
    }

    pub fn job_interrupted(
        deposit_id: &str,
        job_id: &str,
        username: &str,
        error: &JobError,
    ) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            exception_class_name: Some(error.class_name().to_string()),
            exception_message: Some(error.to_string()),
            ..Self::bare(deposit_id, OperationAction::JobInterrupted, username)
        }
    }
}

/// Work-queue message instructing a dispatcher to run one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub deposit_id: String,
    pub job_id: String,
    pub job_class_name: String,
    pub username: String,
}

impl JobMessage {
    pub fn new(deposit_id: &str, job_id: &str, job_class_name: &str, username: &str) -> Self {
        Self {
            deposit_id: deposit_id.to_string(),
            job_id: job_id.to_string(),
            job_class_name: job_class_name.to_string(),
            username: username.to_string(),
        }
    }
}

/// Pipeline-wide control action over message consumption.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlAction {
    Quiet,
    Unquiet,
    Stop,
}

/// Pipeline control message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    pub action: ControlAction,
    pub username: String,
}

impl ControlMessage {
    pub fn new(action: ControlAction, username: &str) -> Self {
        Self {
            action,
            username: username.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let json = serde_json::to_string(&OperationAction::JobSuccess).unwrap();
        assert_eq!(json, r#""JOB_SUCCESS""#);
        let back: OperationAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OperationAction::JobSuccess);
    }

    #[test]
    fn test_unknown_action_is_fatal() {
        let result = serde_json::from_str::<OperationAction>(r#""DESTROY""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_operation_message_round_trip() {
        let mut info = HashMap::new();
        info.insert("container".to_string(), "vault-7".to_string());
        let msg = OperationMessage::register("dep-1", "alice", info);

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""depositId":"dep-1""#));
        assert!(json.contains(r#""action":"REGISTER""#));
        // Absent optionals stay off the wire.
        assert!(!json.contains("exceptionClassName"));

        let back: OperationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_job_failure_message_carries_error_details() {
        let error = JobError::domain("bad checksum");
        let msg = OperationMessage::job_failure("dep-1", "job-1", "worker", &error);
        assert_eq!(msg.exception_class_name.as_deref(), Some("DepositFailure"));
        assert_eq!(msg.exception_message.as_deref(), Some("bad checksum"));
        assert!(msg.exception_stack_trace.is_some());
    }

    #[test]
    fn test_job_message_round_trip() {
        let msg = JobMessage::new("dep-1", "job-1", "ValidateJob", "alice");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""jobClassName":"ValidateJob""#));
        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
