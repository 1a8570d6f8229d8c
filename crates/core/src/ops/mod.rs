//! Operation routing: the per-deposit state machine driver.

mod handlers;
mod router;

pub use router::OperationRouter;

use thiserror::Error;

use crate::broker::BrokerError;
use crate::deposit::DepositError;
use crate::jobs::SequenceError;

/// Error type for orchestrator operations.
///
/// Never escapes the router: a failing handler forces the deposit into
/// `Failed` and the carrying message is still acknowledged.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] DepositError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("deposit not found: {0}")]
    DepositNotFound(String),
}
