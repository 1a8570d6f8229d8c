//! Pipeline-wide control: quiet, unquiet and stop, plus the bulk
//! per-deposit variants operators use for maintenance windows.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::deposit::{DepositState, DepositStore};
use crate::messages::{ControlAction, ControlMessage};
use crate::ops::OperationRouter;
use crate::pipeline::PipelineSwitch;

/// Applies control messages to the pipeline switch and runs the bulk
/// deposit operations.
pub struct PipelineController {
    store: Arc<dyn DepositStore>,
    router: Arc<OperationRouter>,
    switch: Arc<PipelineSwitch>,
}

impl PipelineController {
    pub fn new(
        store: Arc<dyn DepositStore>,
        router: Arc<OperationRouter>,
        switch: Arc<PipelineSwitch>,
    ) -> Self {
        Self {
            store,
            router,
            switch,
        }
    }

    /// Applies one control message. Returns false once the pipeline has
    /// stopped and no further messages should be consumed.
    pub async fn handle_control(&self, msg: ControlMessage) -> bool {
        info!(action = ?msg.action, username = %msg.username, "pipeline control received");
        match msg.action {
            ControlAction::Quiet => {
                if let Err(err) = self.switch.quiet() {
                    warn!("pipeline quiet rejected: {err}");
                }
            }
            ControlAction::Unquiet => {
                if let Err(err) = self.switch.unquiet() {
                    warn!("pipeline unquiet rejected: {err}");
                }
            }
            ControlAction::Stop => {
                if let Err(err) = self.switch.stop() {
                    warn!("pipeline stop rejected: {err}");
                    return true;
                }
                return false;
            }
        }
        true
    }

    /// Quiets every running deposit. Each transition happens under the
    /// supervisor lock; deposits another supervisor holds are skipped.
    pub async fn quiet_all_deposits(&self, username: &str) {
        let deposits = match self.store.get_all() {
            Ok(deposits) => deposits,
            Err(err) => {
                error!("could not list deposits for bulk quiet: {err}");
                return;
            }
        };
        for deposit in deposits {
            if deposit.state != DepositState::Running {
                continue;
            }
            if let Err(err) = self.router.quiet_deposit(&deposit.id, username) {
                error!(deposit_id = %deposit.id, "bulk quiet failed: {err}");
            }
        }
        info!(username, "bulk deposit quiet complete");
    }

    /// Re-queues every resumable deposit, then admits from the queue up
    /// to gate capacity.
    pub async fn unquiet_all_deposits(&self, username: &str) {
        let deposits = match self.store.get_all() {
            Ok(deposits) => deposits,
            Err(err) => {
                error!("could not list deposits for bulk unquiet: {err}");
                return;
            }
        };
        for deposit in deposits {
            if !deposit.state.is_resumable() {
                continue;
            }
            if let Err(err) = self.router.resume_deposit(&deposit.id, username) {
                error!(deposit_id = %deposit.id, "bulk unquiet failed: {err}");
            }
        }
        self.router.admit_queued(username).await;
        info!(username, "bulk deposit unquiet complete");
    }
}
