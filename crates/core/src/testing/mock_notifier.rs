//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::Notifier;

/// Mock implementation of the Notifier trait.
///
/// Records every result email request for test assertions instead of
/// sending anything.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit ids a result email was requested for, in order.
    pub async fn sent_for(&self) -> Vec<String> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_result_email(&self, deposit_id: &str) {
        self.sent.write().await.push(deposit_id.to_string());
    }
}
