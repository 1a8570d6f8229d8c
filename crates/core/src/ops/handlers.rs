use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::deposit::{fields, try_supervise, DepositState};
use crate::jobs::{is_domain_class, is_interrupt_class};
use crate::messages::{JobMessage, OperationMessage};
use crate::metrics;
use crate::notify::DepositEvent;

use super::router::OperationRouter;
use super::OrchestratorError;

impl OperationRouter {
    /// REGISTER: record the submission and enqueue the deposit for
    /// admission.
    pub(super) async fn handle_register(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        let id = &msg.deposit_id;
        if let Some(info) = &msg.additional_info {
            for (field, value) in info {
                self.store.set_field(id, field, value)?;
            }
        }
        self.store.set_field(id, fields::DEPOSITOR, &msg.username)?;
        self.store
            .set_field(id, fields::SUBMITTED_AT, &Utc::now().to_rfc3339())?;
        self.store.queue_deposit(id)?;
        self.store.set_state(id, DepositState::Queued)?;
        metrics::DEPOSITS_REGISTERED.inc();
        self.events
            .emit(DepositEvent::Registered {
                deposit_id: id.clone(),
            })
            .await;
        info!(deposit_id = %id, username = %msg.username, "deposit registered");
        Ok(())
    }

    pub(super) async fn handle_pause(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        let id = &msg.deposit_id;
        let Some(_guard) = try_supervise(self.store.as_ref(), id, &msg.username)? else {
            warn!(deposit_id = %id, "pause skipped, supervisor lock held elsewhere");
            return Ok(());
        };
        self.store.set_state(id, DepositState::Paused)?;
        // A paused deposit gives up its slot; its in-flight job message
        // will be dropped at dispatch.
        self.gate.mark_inactive(id);
        info!(deposit_id = %id, "deposit paused");
        Ok(())
    }

    pub(super) async fn handle_quiet(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        self.quiet_deposit(&msg.deposit_id, &msg.username)
    }

    /// Quiets a single deposit. The deposit keeps its gate slot so that
    /// a later resume continues without re-admission.
    pub fn quiet_deposit(&self, deposit_id: &str, username: &str) -> Result<(), OrchestratorError> {
        let Some(_guard) = try_supervise(self.store.as_ref(), deposit_id, username)? else {
            warn!(deposit_id, "quiet skipped, supervisor lock held elsewhere");
            return Ok(());
        };
        self.store.set_state(deposit_id, DepositState::Quieted)?;
        info!(deposit_id, "deposit quieted");
        Ok(())
    }

    pub(super) async fn handle_resume(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        self.resume_deposit(&msg.deposit_id, &msg.username)
    }

    /// Re-queues a resumable deposit, clearing the residue of its
    /// interrupted run so the sequencer restarts from the last completed
    /// step.
    pub fn resume_deposit(&self, deposit_id: &str, username: &str) -> Result<(), OrchestratorError> {
        let Some(_guard) = try_supervise(self.store.as_ref(), deposit_id, username)? else {
            warn!(deposit_id, "resume skipped, supervisor lock held elsewhere");
            return Ok(());
        };
        let state = self.store.get_state(deposit_id)?;
        if !state.is_resumable() {
            warn!(deposit_id, %state, "resume ignored for non-resumable deposit");
            return Ok(());
        }
        self.store.clear_stale_jobs(deposit_id)?;
        self.store.delete_field(deposit_id, fields::ERROR_MESSAGE)?;
        self.store.queue_deposit(deposit_id)?;
        self.store.set_state(deposit_id, DepositState::Queued)?;
        info!(deposit_id, "deposit re-queued for resume");
        Ok(())
    }

    /// JOB_SUCCESS: advance the deposit to its next job, or finish it
    /// when the sequencer reports the terminal step.
    pub(super) async fn handle_job_success(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        let id = &msg.deposit_id;
        let state = self.store.get_state(id)?;
        if state != DepositState::Running {
            // Redelivered or late success. The one live case is the
            // terminal cleanup job completing against a finished
            // deposit, which releases the gate slot it was holding.
            if state == DepositState::Finished {
                self.gate.mark_inactive(id);
                debug!(deposit_id = %id, "cleanup complete, gate slot released");
            } else {
                warn!(deposit_id = %id, %state, "ignoring job success for non-running deposit");
            }
            return Ok(());
        }

        let deposit = self
            .store
            .get(id)?
            .ok_or_else(|| OrchestratorError::DepositNotFound(id.clone()))?;
        let next = self.sequencer.next_job(&deposit)?;
        let job_id = Uuid::new_v4().to_string();
        let job_msg = JobMessage::new(id, &job_id, &next.class_name, &msg.username);

        if next.is_terminal {
            self.store.set_state(id, DepositState::Finished)?;
            self.store
                .set_field(id, fields::END_TIME, &Utc::now().to_rfc3339())?;
            self.notifier.send_result_email(id).await;
            self.events.publish_deposit_complete(id).await;
            // The cleanup job runs after a grace period; the deposit
            // stays gate-active until its success comes back.
            self.broker
                .send_job(job_msg, Some(self.cleanup_delay))
                .await?;
            metrics::DEPOSITS_FINISHED.inc();
            info!(deposit_id = %id, "deposit finished, cleanup scheduled");
        } else {
            self.broker.send_job(job_msg, None).await?;
            debug!(deposit_id = %id, job_class = %next.class_name, "next job dispatched");
        }
        Ok(())
    }

    /// JOB_FAILURE: classify the reported exception and either swallow
    /// it (interruptions), surface its message (domain failures), or
    /// synthesize an error naming the failing job class.
    pub(super) async fn handle_job_failure(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        let id = &msg.deposit_id;
        let Some(_guard) = try_supervise(self.store.as_ref(), id, &msg.username)? else {
            warn!(deposit_id = %id, "failure handling skipped, supervisor lock held elsewhere");
            return Ok(());
        };
        let job_id = msg.job_id.as_deref().unwrap_or_default();
        let class = msg.exception_class_name.as_deref().unwrap_or_default();

        if is_interrupt_class(class) {
            // Graceful stop reported through the failure channel. Not a
            // deposit-level failure.
            if !job_id.is_empty() {
                self.store.record_job_interrupted(id, job_id)?;
            }
            debug!(deposit_id = %id, exception = %class, "interruption reported as failure, ignoring");
            return Ok(());
        }

        if let Some(trace) = &msg.exception_stack_trace {
            error!(deposit_id = %id, exception = %class, "job failure stack trace:\n{trace}");
        }

        let error_message = if is_domain_class(class) {
            msg.exception_message
                .clone()
                .unwrap_or_else(|| "deposit failed".to_string())
        } else {
            let job_class = if job_id.is_empty() {
                None
            } else {
                self.store.get_job(id, job_id)?.map(|record| record.class_name)
            };
            match job_class {
                Some(job_class) => format!("Job {job_class} failed unexpectedly ({class})"),
                None => format!("Job failed unexpectedly ({class})"),
            }
        };

        if !job_id.is_empty() {
            self.store.record_job_failed(id, job_id)?;
        }
        self.store.fail(id, Some(&error_message))?;
        self.store
            .set_field(id, fields::END_TIME, &Utc::now().to_rfc3339())?;
        self.notifier.send_result_email(id).await;
        self.events
            .emit(DepositEvent::Failed {
                deposit_id: id.clone(),
                error: Some(error_message.clone()),
            })
            .await;
        self.gate.mark_inactive(id);
        metrics::DEPOSITS_FAILED.inc();
        warn!(deposit_id = %id, error = %error_message, "deposit failed");
        Ok(())
    }

    /// JOB_INTERRUPTED: a graceful stop moves a running deposit to
    /// quieted. It keeps its gate slot for the eventual resume.
    pub(super) async fn handle_job_interrupted(
        &self,
        msg: &OperationMessage,
    ) -> Result<(), OrchestratorError> {
        let id = &msg.deposit_id;
        let state = self.store.get_state(id)?;
        if state != DepositState::Running {
            debug!(deposit_id = %id, %state, "ignoring interrupt for non-running deposit");
            return Ok(());
        }
        self.store.set_state(id, DepositState::Quieted)?;
        info!(deposit_id = %id, "deposit quieted after job interruption");
        Ok(())
    }
}
