use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::MessageBroker;
use crate::deposit::{fields, try_supervise, DepositState, DepositStore};
use crate::gate::AdmissionGate;
use crate::jobs::JobSequencer;
use crate::messages::{JobMessage, OperationAction, OperationMessage};
use crate::metrics;
use crate::notify::{EventHandle, Notifier};

use super::OrchestratorError;

/// Routes operation messages to their handlers and keeps the admission
/// gate fed from the deposit queue.
///
/// Every consumed message is acknowledged exactly once, whatever its
/// handler did: a handler error forces the deposit into `Failed` instead
/// of triggering redelivery, because most operations are not idempotent
/// and a replay would corrupt deposit state.
pub struct OperationRouter {
    pub(super) store: Arc<dyn DepositStore>,
    pub(super) gate: Arc<AdmissionGate>,
    pub(super) broker: Arc<dyn MessageBroker>,
    pub(super) sequencer: Arc<dyn JobSequencer>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) events: EventHandle,
    pub(super) cleanup_delay: Duration,
}

impl OperationRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DepositStore>,
        gate: Arc<AdmissionGate>,
        broker: Arc<dyn MessageBroker>,
        sequencer: Arc<dyn JobSequencer>,
        notifier: Arc<dyn Notifier>,
        events: EventHandle,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            store,
            gate,
            broker,
            sequencer,
            notifier,
            events,
            cleanup_delay,
        }
    }

    /// Handles a single operation message to completion.
    ///
    /// Returning from this method is the acknowledgement: the message is
    /// never redelivered, so every path below must leave the deposit in a
    /// coherent state.
    pub async fn handle_operation(&self, msg: OperationMessage) {
        let deposit_id = msg.deposit_id.clone();
        let username = msg.username.clone();
        debug!(deposit_id, action = %msg.action, "routing operation");

        let result = match msg.action {
            OperationAction::Register => self.handle_register(&msg).await,
            OperationAction::Pause => self.handle_pause(&msg).await,
            OperationAction::Resume => self.handle_resume(&msg).await,
            OperationAction::Quiet => self.handle_quiet(&msg).await,
            OperationAction::JobSuccess => self.handle_job_success(&msg).await,
            OperationAction::JobFailure => self.handle_job_failure(&msg).await,
            OperationAction::JobInterrupted => self.handle_job_interrupted(&msg).await,
        };

        if let Err(err) = result {
            error!(deposit_id, action = %msg.action, "operation handler failed: {err}");
            if let Err(store_err) = self.store.fail(&deposit_id, Some(&err.to_string())) {
                error!(deposit_id, "could not mark deposit failed: {store_err}");
            }
            self.gate.mark_inactive(&deposit_id);
            metrics::DEPOSITS_FAILED.inc();
        }

        metrics::GATE_ACTIVE.set(self.gate.active_count() as i64);
        self.admit_next(&deposit_id, &username).await;
    }

    /// Returns true when the queue head can start now: either a slot is
    /// free, or the head is still gate-active (quieted, then resumed)
    /// and needs no new slot. Without the second case a pipeline whose
    /// every slot is held by a quieted deposit could never be resumed.
    fn can_admit_head(&self) -> bool {
        match self.store.peek_next_queued() {
            Ok(Some(head_id)) => {
                self.gate.is_active(&head_id) || self.gate.accepting_new_deposits()
            }
            Ok(None) => false,
            Err(err) => {
                warn!("could not peek deposit queue: {err}");
                false
            }
        }
    }

    /// Pulls the next queued deposit into the gate when the deposit this
    /// message concerned has settled out of `Running`.
    async fn admit_next(&self, handled_id: &str, username: &str) {
        let state = match self.store.get_state(handled_id) {
            Ok(state) => state,
            Err(err) => {
                warn!(deposit_id = handled_id, "admission state check failed: {err}");
                return;
            }
        };
        if !matches!(
            state,
            DepositState::Paused
                | DepositState::Finished
                | DepositState::Failed
                | DepositState::Queued
        ) {
            return;
        }
        if !self.can_admit_head() {
            return;
        }
        match self.store.take_next_queued() {
            Ok(Some(next_id)) => {
                if let Err(err) = self.start_deposit(&next_id, username).await {
                    error!(deposit_id = next_id, "admission start failed: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => warn!("could not poll deposit queue: {err}"),
        }
    }

    /// Admits queued deposits until neither a free slot nor a still
    /// gate-active head remains, or the queue is empty. Used at startup
    /// and after a pipeline-wide unquiet.
    pub async fn admit_queued(&self, username: &str) {
        while self.can_admit_head() {
            match self.store.take_next_queued() {
                Ok(Some(next_id)) => {
                    if let Err(err) = self.start_deposit(&next_id, username).await {
                        error!(deposit_id = next_id, "admission start failed: {err}");
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("could not poll deposit queue: {err}");
                    break;
                }
            }
        }
        metrics::GATE_ACTIVE.set(self.gate.active_count() as i64);
    }

    /// Starts (or resumes) execution of a deposit under the supervisor
    /// lock. A start failure fails the deposit rather than propagating.
    pub async fn start_deposit(
        &self,
        deposit_id: &str,
        username: &str,
    ) -> Result<(), OrchestratorError> {
        let Some(_guard) = try_supervise(self.store.as_ref(), deposit_id, username)? else {
            debug!(deposit_id, "another supervisor holds the lock, skipping start");
            return Ok(());
        };
        if let Err(err) = self.start_supervised(deposit_id, username).await {
            error!(deposit_id, "failed to start deposit: {err}");
            self.store.fail(deposit_id, Some(&err.to_string()))?;
            self.gate.mark_inactive(deposit_id);
            metrics::DEPOSITS_FAILED.inc();
        }
        Ok(())
    }

    async fn start_supervised(
        &self,
        deposit_id: &str,
        username: &str,
    ) -> Result<(), OrchestratorError> {
        // A deposit resuming from quiet is still gate-active and may
        // proceed; a fresh one must win a slot or go back to the queue.
        if !self.gate.is_active(deposit_id) && !self.gate.mark_active(deposit_id) {
            warn!(deposit_id, "admission gate full, re-queueing");
            self.store.queue_deposit(deposit_id)?;
            return Ok(());
        }

        self.store.set_state(deposit_id, DepositState::Running)?;
        let deposit = self
            .store
            .get(deposit_id)?
            .ok_or_else(|| OrchestratorError::DepositNotFound(deposit_id.to_string()))?;

        if deposit.field(fields::START_TIME).is_none() {
            self.store
                .set_field(deposit_id, fields::START_TIME, &Utc::now().to_rfc3339())?;
        }

        let next = self.sequencer.next_job(&deposit)?;
        let job_id = Uuid::new_v4().to_string();
        let job_msg = JobMessage::new(deposit_id, &job_id, &next.class_name, username);
        self.broker.send_job(job_msg, None).await?;
        metrics::DEPOSITS_STARTED.inc();
        info!(deposit_id, job_class = %next.class_name, "deposit started");
        Ok(())
    }
}
