//! Testing utilities: mock collaborators and controllable jobs for
//! pipeline tests without real infrastructure.

mod memory_store;
mod mock_notifier;
mod test_jobs;

pub use memory_store::MemoryDepositStore;
pub use mock_notifier::MockNotifier;
pub use test_jobs::{
    test_registry, CheckpointJob, DomainFailJob, ExplodeJob, SucceedJob, CHECKPOINT_JOB,
    DOMAIN_FAIL_JOB, EXPLODE_JOB, SUCCEED_JOB,
};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::deposit::DepositStore;
    use crate::messages::OperationMessage;
    use crate::testing::MemoryDepositStore;

    /// An in-memory deposit store.
    pub fn store() -> Arc<dyn DepositStore> {
        Arc::new(MemoryDepositStore::new())
    }

    /// A REGISTER message with a small field bag.
    pub fn register_message(deposit_id: &str, username: &str) -> OperationMessage {
        let mut info = HashMap::new();
        info.insert("container".to_string(), "vault-1".to_string());
        info.insert("depositorEmail".to_string(), format!("{username}@example.org"));
        OperationMessage::register(deposit_id, username, info)
    }
}
