//! Job sequencing: the collaborator interface plus the standard ordered
//! step list implementation.

use std::sync::Arc;

use thiserror::Error;

use crate::deposit::{Deposit, DepositStore};

/// Error type for job sequencing.
#[derive(Debug, Error)]
#[error("job sequencing failed: {0}")]
pub struct SequenceError(pub String);

/// The next job to run for a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextJob {
    /// Job class identifier resolvable through the registry.
    pub class_name: String,
    /// True for the final cleanup step; scheduling it marks the deposit
    /// finished.
    pub is_terminal: bool,
}

impl NextJob {
    pub fn step(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            is_terminal: false,
        }
    }

    pub fn terminal(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            is_terminal: true,
        }
    }
}

/// Decides a deposit's next pipeline step from its field bag and recorded
/// progress. Implementations are out of scope for the orchestrator; they only
/// have to be deterministic for an unchanged deposit.
pub trait JobSequencer: Send + Sync {
    fn next_job(&self, deposit: &Deposit) -> Result<NextJob, SequenceError>;
}

/// Sequencer over a fixed, ordered list of job classes.
///
/// Progress is derived from the count of completed job records, which
/// survives a resume, so an interrupted step is always re-run from the
/// last completed one. The final step is the terminal cleanup.
pub struct StepSequencer {
    steps: Vec<String>,
    store: Arc<dyn DepositStore>,
}

impl StepSequencer {
    pub fn new(steps: Vec<String>, store: Arc<dyn DepositStore>) -> Self {
        Self { steps, store }
    }
}

impl JobSequencer for StepSequencer {
    fn next_job(&self, deposit: &Deposit) -> Result<NextJob, SequenceError> {
        let completed = self
            .store
            .completed_job_count(&deposit.id)
            .map_err(|e| SequenceError(e.to_string()))? as usize;
        match self.steps.get(completed) {
            Some(class_name) if completed + 1 == self.steps.len() => {
                Ok(NextJob::terminal(class_name.clone()))
            }
            Some(class_name) => Ok(NextJob::step(class_name.clone())),
            None => Err(SequenceError(format!(
                "deposit {} has no step {completed}",
                deposit.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit::SqliteDepositStore;

    fn sequencer(store: Arc<dyn DepositStore>) -> StepSequencer {
        StepSequencer::new(
            vec!["ValidateJob".to_string(), "CleanupJob".to_string()],
            store,
        )
    }

    #[test]
    fn test_first_step_when_nothing_completed() {
        let store: Arc<dyn DepositStore> = Arc::new(SqliteDepositStore::in_memory().unwrap());
        let deposit = Deposit::new("dep-1");
        let next = sequencer(Arc::clone(&store)).next_job(&deposit).unwrap();
        assert_eq!(next, NextJob::step("ValidateJob"));
    }

    #[test]
    fn test_last_step_is_terminal() {
        let store: Arc<dyn DepositStore> = Arc::new(SqliteDepositStore::in_memory().unwrap());
        store.record_job_started("dep-1", "job-1", "ValidateJob").unwrap();
        store.record_job_completed("dep-1", "job-1").unwrap();

        let deposit = Deposit::new("dep-1");
        let next = sequencer(Arc::clone(&store)).next_job(&deposit).unwrap();
        assert_eq!(next, NextJob::terminal("CleanupJob"));
    }

    #[test]
    fn test_interrupted_step_repeats_after_clear() {
        let store: Arc<dyn DepositStore> = Arc::new(SqliteDepositStore::in_memory().unwrap());
        store.record_job_started("dep-1", "job-1", "ValidateJob").unwrap();
        store.record_job_interrupted("dep-1", "job-1").unwrap();
        store.clear_stale_jobs("dep-1").unwrap();

        let deposit = Deposit::new("dep-1");
        let next = sequencer(Arc::clone(&store)).next_job(&deposit).unwrap();
        assert_eq!(next, NextJob::step("ValidateJob"));
    }

    #[test]
    fn test_past_the_end_is_an_error() {
        let store: Arc<dyn DepositStore> = Arc::new(SqliteDepositStore::in_memory().unwrap());
        for job in ["job-1", "job-2"] {
            store.record_job_started("dep-1", job, "AnyJob").unwrap();
            store.record_job_completed("dep-1", job).unwrap();
        }
        let deposit = Deposit::new("dep-1");
        assert!(sequencer(store).next_job(&deposit).is_err());
    }
}
