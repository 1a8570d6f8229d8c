//! Job execution seams: error taxonomy, job trait, registry, sequencer.

mod registry;
mod sequencer;

pub use registry::{JobConstructor, JobRegistry, RegistryError};
pub use sequencer::{JobSequencer, NextJob, SequenceError, StepSequencer};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::deposit::DepositStore;

/// Wire class name reported for domain failures.
pub const DOMAIN_FAILURE_CLASS: &str = "DepositFailure";
/// Wire class name reported for pause interruptions.
pub const PAUSE_INTERRUPT_CLASS: &str = "PauseInterrupt";
/// Wire class name reported for shutdown interruptions.
pub const SHUTDOWN_INTERRUPT_CLASS: &str = "ShutdownInterrupt";

/// Why a job was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// The deposit was paused by an operator before or during the job.
    Pause,
    /// The pipeline is quieting or shutting down.
    Shutdown,
}

impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterruptKind::Pause => f.write_str("pause"),
            InterruptKind::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Error raised by a job execution.
///
/// Three kinds: explicit domain failures with a human-readable message,
/// expected interruptions that are not failures at all, and everything else,
/// reported with the failing job's class name since no structured message is
/// available.
#[derive(Debug, Error)]
pub enum JobError {
    /// Explicit, human-readable failure (e.g. validation failure).
    #[error("{message}")]
    Domain {
        message: String,
        details: Option<String>,
    },

    /// Expected halt: operator pause or pipeline shutdown. Not a failure.
    #[error("job interrupted by {0}")]
    Interrupted(InterruptKind),

    /// Any other error, carrying whatever class name the source exposed.
    #[error("{message}")]
    Unclassified { class_name: String, message: String },
}

impl JobError {
    /// Domain failure with a message only.
    pub fn domain(message: impl Into<String>) -> Self {
        JobError::Domain {
            message: message.into(),
            details: None,
        }
    }

    /// Domain failure with message and details.
    pub fn domain_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        JobError::Domain {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Unclassified failure attributed to a source class.
    pub fn unclassified(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        JobError::Unclassified {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// Returns true for the interruption kinds.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, JobError::Interrupted(_))
    }

    /// The class name put on the wire for this error.
    pub fn class_name(&self) -> &str {
        match self {
            JobError::Domain { .. } => DOMAIN_FAILURE_CLASS,
            JobError::Interrupted(InterruptKind::Pause) => PAUSE_INTERRUPT_CLASS,
            JobError::Interrupted(InterruptKind::Shutdown) => SHUTDOWN_INTERRUPT_CLASS,
            JobError::Unclassified { class_name, .. } => class_name,
        }
    }
}

/// Returns true if a wire class name denotes an interruption.
pub fn is_interrupt_class(class_name: &str) -> bool {
    class_name == PAUSE_INTERRUPT_CLASS || class_name == SHUTDOWN_INTERRUPT_CLASS
}

/// Returns true if a wire class name denotes an explicit domain failure.
pub fn is_domain_class(class_name: &str) -> bool {
    class_name == DOMAIN_FAILURE_CLASS
}

/// Execution context handed to a running job.
///
/// Jobs observe cancellation at their own checkpoints through the store: the
/// orchestrator never kills a running job.
#[derive(Clone)]
pub struct JobContext {
    pub deposit_id: String,
    pub job_id: String,
    pub store: Arc<dyn DepositStore>,
}

impl JobContext {
    /// Checkpoint helper: raises the pause interruption if the deposit is no
    /// longer running.
    pub fn check_interrupted(&self) -> Result<(), JobError> {
        use crate::deposit::DepositState;
        match self.store.get_state(&self.deposit_id) {
            Ok(DepositState::Paused) => Err(JobError::Interrupted(InterruptKind::Pause)),
            Ok(DepositState::Running) => Ok(()),
            Ok(_) => Err(JobError::Interrupted(InterruptKind::Shutdown)),
            Err(e) => Err(JobError::unclassified("DepositStore", e.to_string())),
        }
    }
}

/// One pipeline step executed for a deposit.
#[async_trait]
pub trait Job: Send + Sync {
    /// The class identifier this job is registered under.
    fn class_name(&self) -> &'static str;

    /// Run the job to completion.
    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_class_name() {
        let e = JobError::domain("bad checksum");
        assert_eq!(e.class_name(), DOMAIN_FAILURE_CLASS);
        assert_eq!(e.to_string(), "bad checksum");
        assert!(is_domain_class(e.class_name()));
    }

    #[test]
    fn test_interrupt_class_names() {
        let pause = JobError::Interrupted(InterruptKind::Pause);
        let shutdown = JobError::Interrupted(InterruptKind::Shutdown);
        assert!(pause.is_interrupt());
        assert!(is_interrupt_class(pause.class_name()));
        assert!(is_interrupt_class(shutdown.class_name()));
        assert!(!is_domain_class(pause.class_name()));
    }

    #[test]
    fn test_unclassified_keeps_source_class() {
        let e = JobError::unclassified("NullPointerException", "boom");
        assert_eq!(e.class_name(), "NullPointerException");
        assert!(!is_interrupt_class(e.class_name()));
        assert!(!is_domain_class(e.class_name()));
    }
}
