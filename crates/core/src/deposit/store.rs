//! Deposit status store contract.

use thiserror::Error;
use tracing::warn;

use super::types::{Deposit, DepositState, JobRecord};

/// Error type for deposit store operations.
#[derive(Debug, Error)]
pub enum DepositError {
    /// Deposit not found.
    #[error("Deposit not found: {0}")]
    NotFound(String),

    /// Storage backend error.
    #[error("Store error: {0}")]
    Storage(String),
}

/// Trait for deposit status store backends.
///
/// The store is shared across orchestrator instances and must provide atomic
/// compare-and-set semantics for lock acquisition and queue pop. Field
/// mutations are last-writer-wins; callers serialize them through the
/// supervisor lock or re-check state before acting.
pub trait DepositStore: Send + Sync {
    /// Get a deposit's full record (state + field bag).
    fn get(&self, id: &str) -> Result<Option<Deposit>, DepositError>;

    /// Set one field on a deposit, creating the record if needed.
    fn set_field(&self, id: &str, field: &str, value: &str) -> Result<(), DepositError>;

    /// Delete one field from a deposit; no-op if absent.
    fn delete_field(&self, id: &str, field: &str) -> Result<(), DepositError>;

    /// Get a deposit's state. Unknown deposits are `Unregistered`.
    fn get_state(&self, id: &str) -> Result<DepositState, DepositError>;

    /// Set a deposit's state. Not atomically paired with field writes unless
    /// called inside a lock-held section.
    fn set_state(&self, id: &str, state: DepositState) -> Result<(), DepositError>;

    /// Append a deposit to the FIFO admission queue.
    ///
    /// Independent of `state`, though callers always also set the state to
    /// `Queued`.
    fn queue_deposit(&self, id: &str) -> Result<(), DepositError>;

    /// Pop the head of the FIFO admission queue, if any.
    fn take_next_queued(&self) -> Result<Option<String>, DepositError>;

    /// Read the head of the FIFO admission queue without removing it.
    fn peek_next_queued(&self) -> Result<Option<String>, DepositError>;

    /// Acquire the supervisor lock for a deposit. Fail-fast: returns false
    /// without blocking if the lock is already held.
    fn add_supervisor_lock(&self, id: &str, owner: &str) -> Result<bool, DepositError>;

    /// Release the supervisor lock; no-op if not held.
    fn remove_supervisor_lock(&self, id: &str) -> Result<(), DepositError>;

    /// Snapshot of all deposits, used by bulk pipeline operations.
    fn get_all(&self) -> Result<Vec<Deposit>, DepositError>;

    /// Convenience transition to `Failed`, recording the message.
    fn fail(&self, id: &str, message: Option<&str>) -> Result<(), DepositError>;

    // ------------------------------------------------------------------
    // Job records
    // ------------------------------------------------------------------

    /// Record that a job started running.
    fn record_job_started(
        &self,
        deposit_id: &str,
        job_id: &str,
        class_name: &str,
    ) -> Result<(), DepositError>;

    /// Record job completion, incrementing the completion counter.
    fn record_job_completed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError>;

    /// Record that a job was interrupted.
    fn record_job_interrupted(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError>;

    /// Record that a job failed.
    fn record_job_failed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError>;

    /// Get one job record.
    fn get_job(&self, deposit_id: &str, job_id: &str) -> Result<Option<JobRecord>, DepositError>;

    /// Number of jobs that completed for this deposit. Used by sequencers to
    /// decide the next step after a resume.
    fn completed_job_count(&self, deposit_id: &str) -> Result<u32, DepositError>;

    /// Remove job records left in a non-terminal status by an unrelated
    /// failure or interrupt. Must run before a deposit resumes.
    fn clear_stale_jobs(&self, deposit_id: &str) -> Result<(), DepositError>;
}

/// RAII guard for a held supervisor lock.
///
/// The lock is a capability held in the store, not a language-level lock.
/// Dropping the guard releases it even when the holding handler errors.
pub struct SupervisorGuard<'a> {
    store: &'a dyn DepositStore,
    deposit_id: String,
}

impl Drop for SupervisorGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.remove_supervisor_lock(&self.deposit_id) {
            warn!(
                deposit_id = %self.deposit_id,
                "failed to release supervisor lock: {e}"
            );
        }
    }
}

/// Attempt to acquire the supervisor lock for a deposit.
///
/// Returns `None` if the lock is already held by another actor; the caller
/// skips the mutation rather than waiting.
pub fn try_supervise<'a>(
    store: &'a dyn DepositStore,
    deposit_id: &str,
    owner: &str,
) -> Result<Option<SupervisorGuard<'a>>, DepositError> {
    if store.add_supervisor_lock(deposit_id, owner)? {
        Ok(Some(SupervisorGuard {
            store,
            deposit_id: deposit_id.to_string(),
        }))
    } else {
        Ok(None)
    }
}
