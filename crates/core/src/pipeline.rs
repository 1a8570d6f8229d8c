//! Pipeline-wide state: the global switch over message consumption.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Process-wide pipeline state, independent of any deposit's state.
///
/// Governs whether the operation router and the job dispatch loop accept
/// messages at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Consuming messages normally.
    Active,
    /// Booting; consumption allowed while components come up.
    Starting,
    /// Consumption halted; messages stay on their queues.
    Quieted,
    /// Permanently shut down.
    Stopped,
}

impl PipelineState {
    /// Returns true while message consumption is allowed.
    pub fn is_consuming(&self) -> bool {
        matches!(self, PipelineState::Active | PipelineState::Starting)
    }
}

/// Error type for invalid pipeline transitions.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot {action} pipeline from state {from:?}")]
    InvalidTransition {
        action: &'static str,
        from: PipelineState,
    },
}

/// Shared switch over pipeline state, built on a watch channel so consumer
/// loops can await changes instead of polling.
#[derive(Debug)]
pub struct PipelineSwitch {
    tx: watch::Sender<PipelineState>,
}

impl PipelineSwitch {
    /// Create a switch in the `Starting` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PipelineState::Starting);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        *self.tx.borrow()
    }

    /// Returns true while message consumption is allowed.
    pub fn is_consuming(&self) -> bool {
        self.state().is_consuming()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.tx.subscribe()
    }

    /// Mark startup complete.
    pub fn set_active(&self) {
        self.tx.send_replace(PipelineState::Active);
    }

    /// Halt message consumption. Only valid from `Active`.
    pub fn quiet(&self) -> Result<(), ControlError> {
        self.transition("quiet", PipelineState::Quieted, |s| {
            matches!(s, PipelineState::Active)
        })
    }

    /// Restart message consumption. Only valid from `Quieted`.
    pub fn unquiet(&self) -> Result<(), ControlError> {
        self.transition("unquiet", PipelineState::Active, |s| {
            matches!(s, PipelineState::Quieted)
        })
    }

    /// Permanently shut consumption down. Rejected once stopped.
    pub fn stop(&self) -> Result<(), ControlError> {
        self.transition("stop", PipelineState::Stopped, |s| {
            !matches!(s, PipelineState::Stopped)
        })
    }

    fn transition(
        &self,
        action: &'static str,
        to: PipelineState,
        allowed: impl Fn(PipelineState) -> bool,
    ) -> Result<(), ControlError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if allowed(*state) {
                info!(from = ?*state, to = ?to, "pipeline state change: {action}");
                *state = to;
                true
            } else {
                result = Err(ControlError::InvalidTransition {
                    action,
                    from: *state,
                });
                false
            }
        });
        result
    }

    /// Wait until consumption is allowed. Returns false once the pipeline is
    /// stopped for good.
    pub async fn wait_consuming(&self) -> bool {
        let mut rx = self.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state.is_consuming() {
                return true;
            }
            if state == PipelineState::Stopped {
                return false;
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

impl Default for PipelineSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_in_starting_and_consuming() {
        let switch = PipelineSwitch::new();
        assert_eq!(switch.state(), PipelineState::Starting);
        assert!(switch.is_consuming());
    }

    #[test]
    fn test_quiet_only_from_active() {
        let switch = PipelineSwitch::new();
        assert!(matches!(
            switch.quiet(),
            Err(ControlError::InvalidTransition { .. })
        ));

        switch.set_active();
        assert!(switch.quiet().is_ok());
        assert_eq!(switch.state(), PipelineState::Quieted);
        assert!(!switch.is_consuming());
    }

    #[test]
    fn test_unquiet_only_from_quieted() {
        let switch = PipelineSwitch::new();
        switch.set_active();
        assert!(switch.unquiet().is_err());

        switch.quiet().unwrap();
        assert!(switch.unquiet().is_ok());
        assert_eq!(switch.state(), PipelineState::Active);
    }

    #[test]
    fn test_stop_rejected_when_stopped() {
        let switch = PipelineSwitch::new();
        assert!(switch.stop().is_ok());
        assert!(switch.stop().is_err());
        assert_eq!(switch.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn test_wait_consuming_returns_false_when_stopped() {
        let switch = PipelineSwitch::new();
        switch.set_active();
        switch.quiet().unwrap();

        let handle = {
            let switch = std::sync::Arc::new(switch);
            let waiter = std::sync::Arc::clone(&switch);
            let handle = tokio::spawn(async move { waiter.wait_consuming().await });
            switch.stop().unwrap();
            handle
        };
        assert!(!handle.await.unwrap());
    }
}
