//! Core deposit data types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Well-known field names in a deposit's field bag.
///
/// The field bag is a flat string map; anything not listed here is treated as
/// opaque job-sequencing input and passed through untouched.
pub mod fields {
    /// Username of the submitting depositor.
    pub const DEPOSITOR: &str = "depositor";
    /// Email address for result notifications.
    pub const EMAIL: &str = "depositorEmail";
    /// Destination container in the repository.
    pub const CONTAINER: &str = "container";
    /// When the deposit was submitted (RFC 3339).
    pub const SUBMITTED_AT: &str = "submittedAt";
    /// When the deposit first started running (RFC 3339).
    pub const START_TIME: &str = "startTime";
    /// When the deposit finished or failed (RFC 3339).
    pub const END_TIME: &str = "endTime";
    /// Last failure message, cleared on resume.
    pub const ERROR_MESSAGE: &str = "errorMessage";
}

/// Current state of a deposit.
///
/// State machine flow:
/// ```text
/// Unregistered -> Queued      (register)
/// Queued       -> Running     (admission)
/// Running      -> Paused      (pause)
/// Running      -> Quieted     (interrupt, or bulk pipeline quiet)
/// Running      -> Failed      (job failure)
/// Running      -> Finished    (terminal job succeeds)
///
/// {Unregistered, Paused, Quieted, Failed} -> Queued   (resume)
/// ```
/// `Running` and `Finished` are not directly resumable. Only one in-flight
/// transition per deposit is permitted at a time, enforced by the supervisor
/// lock rather than by the state value itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DepositState {
    /// Never registered, or record not yet created.
    Unregistered,
    /// Waiting in the FIFO admission queue.
    Queued,
    /// Admitted; a job may currently be dispatched for it.
    Running,
    /// Explicitly paused by an operator.
    Paused,
    /// Gracefully halted (interrupt or pipeline-wide quiet); resumable.
    Quieted,
    /// A job failed; resumable after the cause is addressed.
    Failed,
    /// Terminal cleanup job scheduled; the deposit is done.
    Finished,
}

impl DepositState {
    /// Returns true if a resume may re-queue a deposit in this state.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            DepositState::Unregistered
                | DepositState::Paused
                | DepositState::Quieted
                | DepositState::Failed
        )
    }

    /// Returns true if this is the terminal success state.
    pub fn is_finished(&self) -> bool {
        matches!(self, DepositState::Finished)
    }

    /// Returns the state as a string (for persistence and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositState::Unregistered => "unregistered",
            DepositState::Queued => "queued",
            DepositState::Running => "running",
            DepositState::Paused => "paused",
            DepositState::Quieted => "quieted",
            DepositState::Failed => "failed",
            DepositState::Finished => "finished",
        }
    }

    /// Parses a persisted state string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unregistered" => Some(DepositState::Unregistered),
            "queued" => Some(DepositState::Queued),
            "running" => Some(DepositState::Running),
            "paused" => Some(DepositState::Paused),
            "quieted" => Some(DepositState::Quieted),
            "failed" => Some(DepositState::Failed),
            "finished" => Some(DepositState::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for DepositState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deposit record: one content package moving through the ingest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deposit {
    /// Opaque identifier assigned by the submitter.
    pub id: String,
    /// Current state.
    pub state: DepositState,
    /// Field bag: depositor identity, destination container, timestamps,
    /// last error, and sequencing inputs opaque to the orchestrator.
    pub fields: HashMap<String, String>,
}

impl Deposit {
    /// Creates an unregistered deposit with an empty field bag.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: DepositState::Unregistered,
            fields: HashMap::new(),
        }
    }

    /// Returns a field value if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Status of a single job execution, scoped to one deposit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl JobStatus {
    /// Returns true if the job reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Interrupted => "interrupted",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "interrupted" => Some(JobStatus::Interrupted),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Persisted record of one job execution.
///
/// A record left in a non-terminal status after an unrelated failure or
/// interrupt is considered stale and must be cleared before the deposit
/// resumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    /// Job identifier, unique within the deposit.
    pub job_id: String,
    /// Deposit this job belongs to.
    pub deposit_id: String,
    /// Job class identifier used to resolve the implementation.
    pub class_name: String,
    /// Current status.
    pub status: JobStatus,
    /// Completion counter for progress reporting.
    pub completed_steps: u32,
}
