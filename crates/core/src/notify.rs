//! Notification and completion-event collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::info;

/// Sends the depositor-facing result email for a finished or failed deposit.
/// Rendering and delivery are out of scope for the orchestrator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_result_email(&self, deposit_id: &str);
}

/// Notifier that only logs. Used when no mail transport is configured.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_result_email(&self, deposit_id: &str) {
        info!(deposit_id, "result email suppressed (no mail transport configured)");
    }
}

/// Pipeline lifecycle events observable by downstream systems.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositEvent {
    /// A deposit entered the FIFO admission queue.
    Registered { deposit_id: String },
    /// A deposit's terminal job was scheduled; the deposit is finished.
    Complete { deposit_id: String },
    /// A deposit failed.
    Failed {
        deposit_id: String,
        error: Option<String>,
    },
}

/// Envelope wrapping an event with its emission time.
#[derive(Debug, Clone)]
pub struct DepositEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: DepositEvent,
}

/// Handle for emitting deposit events.
///
/// Cheaply cloneable and shareable across tasks. A full or closed channel is
/// logged, never surfaced to the emitting handler.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<DepositEventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<DepositEventEnvelope>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: DepositEvent) {
        let envelope = DepositEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("failed to emit deposit event: {e}");
        }
    }

    pub async fn publish_deposit_complete(&self, deposit_id: &str) {
        self.emit(DepositEvent::Complete {
            deposit_id: deposit_id.to_string(),
        })
        .await;
    }
}

/// Create an event channel with the given buffer size.
pub fn event_channel(buffer: usize) -> (EventHandle, mpsc::Receiver<DepositEventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventHandle::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_complete_event() {
        let (handle, mut rx) = event_channel(8);
        handle.publish_deposit_complete("dep-1").await;

        let envelope = rx.recv().await.expect("should receive event");
        assert_eq!(
            envelope.event,
            DepositEvent::Complete {
                deposit_id: "dep-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_emit_to_closed_channel_does_not_panic() {
        let (handle, rx) = event_channel(1);
        drop(rx);
        handle.publish_deposit_complete("dep-1").await;
    }
}
