//! Job dispatch: turns job messages into job executions and reports the
//! outcome back on the operation channel.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::broker::MessageBroker;
use crate::deposit::{DepositState, DepositStore};
use crate::gate::AdmissionGate;
use crate::jobs::{InterruptKind, Job, JobContext, JobError, JobRegistry};
use crate::messages::{JobMessage, OperationMessage};
use crate::metrics;
use crate::pipeline::PipelineSwitch;

/// What became of a dispatched job message.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The pipeline is not consuming; the message goes back to the head
    /// of the queue.
    Backpressure(JobMessage),
    /// The deposit is no longer gate-active; the message is discarded.
    Dropped,
    /// The job ran (or failed to instantiate) and its outcome was
    /// reported as an operation message.
    Executed,
}

/// Executes job messages for gate-active deposits.
pub struct JobDispatcher {
    store: Arc<dyn DepositStore>,
    gate: Arc<AdmissionGate>,
    broker: Arc<dyn MessageBroker>,
    registry: Arc<JobRegistry>,
    switch: Arc<PipelineSwitch>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn DepositStore>,
        gate: Arc<AdmissionGate>,
        broker: Arc<dyn MessageBroker>,
        registry: Arc<JobRegistry>,
        switch: Arc<PipelineSwitch>,
    ) -> Self {
        Self {
            store,
            gate,
            broker,
            registry,
            switch,
        }
    }

    pub async fn dispatch(&self, msg: JobMessage) -> DispatchOutcome {
        if !self.switch.is_consuming() {
            debug!(deposit_id = %msg.deposit_id, "pipeline not consuming, returning job message");
            return DispatchOutcome::Backpressure(msg);
        }
        if !self.gate.is_active(&msg.deposit_id) {
            debug!(
                deposit_id = %msg.deposit_id,
                job_class = %msg.job_class_name,
                "deposit not gate-active, dropping job message"
            );
            return DispatchOutcome::Dropped;
        }

        if let Err(err) =
            self.store
                .record_job_started(&msg.deposit_id, &msg.job_id, &msg.job_class_name)
        {
            error!(deposit_id = %msg.deposit_id, "could not record job start: {err}");
            let job_err = JobError::unclassified("DepositStore", err.to_string());
            self.report(&msg, Err(&job_err)).await;
            return DispatchOutcome::Executed;
        }

        let outcome =
            match self
                .registry
                .instantiate(&msg.job_class_name, &msg.job_id, &msg.deposit_id)
            {
                Ok(job) => self.run_guarded(job.as_ref(), &msg).await,
                Err(err) => {
                    error!(deposit_id = %msg.deposit_id, "job instantiation failed: {err}");
                    Err(JobError::unclassified("JobRegistry", err.to_string()))
                }
            };

        self.report(&msg, outcome.as_ref()).await;
        DispatchOutcome::Executed
    }

    /// Runs a job with the standard interruption guard: a deposit no
    /// longer running when the job comes up raises an interruption
    /// instead of running the job body. `Finished` passes too, since the
    /// terminal cleanup job runs against a finished deposit.
    async fn run_guarded(&self, job: &dyn Job, msg: &JobMessage) -> Result<(), JobError> {
        let ctx = JobContext {
            deposit_id: msg.deposit_id.clone(),
            job_id: msg.job_id.clone(),
            store: Arc::clone(&self.store),
        };
        match self.store.get_state(&ctx.deposit_id) {
            Ok(DepositState::Running) | Ok(DepositState::Finished) => {}
            Ok(DepositState::Paused) => return Err(JobError::Interrupted(InterruptKind::Pause)),
            Ok(_) => return Err(JobError::Interrupted(InterruptKind::Shutdown)),
            Err(err) => return Err(JobError::unclassified("DepositStore", err.to_string())),
        }
        job.run(&ctx).await
    }

    /// Records the job outcome and reports it on the operation channel.
    async fn report(&self, msg: &JobMessage, outcome: Result<&(), &JobError>) {
        let (label, record, op) = match outcome {
            Ok(()) => (
                "success",
                self.store.record_job_completed(&msg.deposit_id, &msg.job_id),
                OperationMessage::job_success(&msg.deposit_id, &msg.job_id, &msg.username),
            ),
            Err(err) if err.is_interrupt() => (
                "interrupted",
                self.store
                    .record_job_interrupted(&msg.deposit_id, &msg.job_id),
                OperationMessage::job_interrupted(&msg.deposit_id, &msg.job_id, &msg.username, err),
            ),
            Err(err) => (
                "failure",
                self.store.record_job_failed(&msg.deposit_id, &msg.job_id),
                OperationMessage::job_failure(&msg.deposit_id, &msg.job_id, &msg.username, err),
            ),
        };
        if let Err(err) = record {
            warn!(deposit_id = %msg.deposit_id, "could not record job outcome: {err}");
        }
        metrics::JOB_OUTCOMES.with_label_values(&[label]).inc();
        if let Err(err) = self.broker.send_operation(op).await {
            error!(deposit_id = %msg.deposit_id, "could not report job outcome: {err}");
        }
    }
}
