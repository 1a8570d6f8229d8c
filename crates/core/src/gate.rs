//! Admission gate: bounds how many deposits run concurrently.

use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory bounded set of active deposit IDs.
///
/// Exclusively owned by one orchestrator process; the bound is not enforced
/// across instances. Invariant: a deposit ID is in the set if and only if the
/// orchestrator believes a job for it may currently be dispatched.
#[derive(Debug)]
pub struct AdmissionGate {
    active: Mutex<HashSet<String>>,
    max_concurrent: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `max_concurrent` deposits.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            max_concurrent,
        }
    }

    /// Mark a deposit active. Returns false (and does nothing) if the deposit
    /// is already present or the gate is at capacity.
    pub fn mark_active(&self, id: &str) -> bool {
        let mut active = self.active.lock().unwrap();
        if active.contains(id) || active.len() >= self.max_concurrent {
            return false;
        }
        active.insert(id.to_string());
        true
    }

    /// Mark a deposit inactive. Idempotent.
    pub fn mark_inactive(&self, id: &str) {
        self.active.lock().unwrap().remove(id);
    }

    /// Returns true while a free admission slot exists.
    pub fn accepting_new_deposits(&self) -> bool {
        self.active.lock().unwrap().len() < self.max_concurrent
    }

    /// Returns true if the deposit is currently marked active.
    pub fn is_active(&self, id: &str) -> bool {
        self.active.lock().unwrap().contains(id)
    }

    /// Number of deposits currently marked active.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Configured maximum.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
