//! In-memory deposit store for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::deposit::{
    fields, Deposit, DepositError, DepositState, DepositStore, JobRecord, JobStatus,
};

#[derive(Default)]
struct Inner {
    states: HashMap<String, DepositState>,
    fields: HashMap<String, HashMap<String, String>>,
    queue: VecDeque<String>,
    locks: HashMap<String, String>,
    jobs: HashMap<(String, String), JobRecord>,
}

impl Inner {
    fn ensure(&mut self, id: &str) {
        self.states
            .entry(id.to_string())
            .or_insert(DepositState::Unregistered);
    }
}

/// HashMap-backed implementation of the `DepositStore` trait.
///
/// Same observable semantics as the sqlite store, without the database:
/// unknown deposits read as `Unregistered`, the queue is FIFO, and lock
/// acquisition is fail-fast.
#[derive(Default)]
pub struct MemoryDepositStore {
    inner: Mutex<Inner>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current queue contents, head first. For test assertions.
    pub fn queued(&self) -> Vec<String> {
        self.inner.lock().unwrap().queue.iter().cloned().collect()
    }

    /// Owner of a held supervisor lock, if any. For test assertions.
    pub fn lock_owner(&self, id: &str) -> Option<String> {
        self.inner.lock().unwrap().locks.get(id).cloned()
    }
}

impl DepositStore for MemoryDepositStore {
    fn get(&self, id: &str) -> Result<Option<Deposit>, DepositError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.states.get(id).map(|state| Deposit {
            id: id.to_string(),
            state: *state,
            fields: inner.fields.get(id).cloned().unwrap_or_default(),
        }))
    }

    fn set_field(&self, id: &str, field: &str, value: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure(id);
        inner
            .fields
            .entry(id.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn delete_field(&self, id: &str, field: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(bag) = inner.fields.get_mut(id) {
            bag.remove(field);
        }
        Ok(())
    }

    fn get_state(&self, id: &str) -> Result<DepositState, DepositError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .states
            .get(id)
            .copied()
            .unwrap_or(DepositState::Unregistered))
    }

    fn set_state(&self, id: &str, state: DepositState) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        inner.states.insert(id.to_string(), state);
        Ok(())
    }

    fn queue_deposit(&self, id: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure(id);
        inner.queue.push_back(id.to_string());
        Ok(())
    }

    fn take_next_queued(&self) -> Result<Option<String>, DepositError> {
        Ok(self.inner.lock().unwrap().queue.pop_front())
    }

    fn peek_next_queued(&self) -> Result<Option<String>, DepositError> {
        Ok(self.inner.lock().unwrap().queue.front().cloned())
    }

    fn add_supervisor_lock(&self, id: &str, owner: &str) -> Result<bool, DepositError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.locks.contains_key(id) {
            return Ok(false);
        }
        inner.locks.insert(id.to_string(), owner.to_string());
        Ok(true)
    }

    fn remove_supervisor_lock(&self, id: &str) -> Result<(), DepositError> {
        self.inner.lock().unwrap().locks.remove(id);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Deposit>, DepositError> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<_> = inner.states.keys().cloned().collect();
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .map(|id| Deposit {
                state: inner.states[&id],
                fields: inner.fields.get(&id).cloned().unwrap_or_default(),
                id,
            })
            .collect())
    }

    fn fail(&self, id: &str, message: Option<&str>) -> Result<(), DepositError> {
        if let Some(message) = message {
            self.set_field(id, fields::ERROR_MESSAGE, message)?;
        }
        self.set_state(id, DepositState::Failed)
    }

    fn record_job_started(
        &self,
        deposit_id: &str,
        job_id: &str,
        class_name: &str,
    ) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (deposit_id.to_string(), job_id.to_string());
        let record = inner.jobs.entry(key).or_insert_with(|| JobRecord {
            job_id: job_id.to_string(),
            deposit_id: deposit_id.to_string(),
            class_name: class_name.to_string(),
            status: JobStatus::Running,
            completed_steps: 0,
        });
        record.class_name = class_name.to_string();
        record.status = JobStatus::Running;
        Ok(())
    }

    fn record_job_completed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (deposit_id.to_string(), job_id.to_string());
        if let Some(record) = inner.jobs.get_mut(&key) {
            record.status = JobStatus::Completed;
            record.completed_steps += 1;
        }
        Ok(())
    }

    fn record_job_interrupted(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (deposit_id.to_string(), job_id.to_string());
        if let Some(record) = inner.jobs.get_mut(&key) {
            record.status = JobStatus::Interrupted;
        }
        Ok(())
    }

    fn record_job_failed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (deposit_id.to_string(), job_id.to_string());
        if let Some(record) = inner.jobs.get_mut(&key) {
            record.status = JobStatus::Failed;
        }
        Ok(())
    }

    fn get_job(&self, deposit_id: &str, job_id: &str) -> Result<Option<JobRecord>, DepositError> {
        let inner = self.inner.lock().unwrap();
        let key = (deposit_id.to_string(), job_id.to_string());
        Ok(inner.jobs.get(&key).cloned())
    }

    fn completed_job_count(&self, deposit_id: &str) -> Result<u32, DepositError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .filter(|r| r.deposit_id == deposit_id && r.status == JobStatus::Completed)
            .count() as u32)
    }

    fn clear_stale_jobs(&self, deposit_id: &str) -> Result<(), DepositError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .jobs
            .retain(|(dep, _), record| dep != deposit_id || record.status == JobStatus::Completed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_deposit_is_unregistered() {
        let store = MemoryDepositStore::new();
        assert_eq!(
            store.get_state("missing").unwrap(),
            DepositState::Unregistered
        );
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_queue_is_fifo() {
        let store = MemoryDepositStore::new();
        store.queue_deposit("a").unwrap();
        store.queue_deposit("b").unwrap();
        assert_eq!(store.queued(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.peek_next_queued().unwrap().as_deref(), Some("a"));
        assert_eq!(store.take_next_queued().unwrap().as_deref(), Some("a"));
        assert_eq!(store.take_next_queued().unwrap().as_deref(), Some("b"));
        assert_eq!(store.take_next_queued().unwrap(), None);
        assert_eq!(store.peek_next_queued().unwrap(), None);
    }

    #[test]
    fn test_lock_is_fail_fast() {
        let store = MemoryDepositStore::new();
        assert!(store.add_supervisor_lock("dep-1", "alice").unwrap());
        assert!(!store.add_supervisor_lock("dep-1", "bob").unwrap());
        assert_eq!(store.lock_owner("dep-1").as_deref(), Some("alice"));
        store.remove_supervisor_lock("dep-1").unwrap();
        assert!(store.add_supervisor_lock("dep-1", "bob").unwrap());
    }

    #[test]
    fn test_clear_stale_jobs_keeps_completed() {
        let store = MemoryDepositStore::new();
        store.record_job_started("dep-1", "job-1", "StepA").unwrap();
        store.record_job_completed("dep-1", "job-1").unwrap();
        store.record_job_started("dep-1", "job-2", "StepB").unwrap();
        store.record_job_interrupted("dep-1", "job-2").unwrap();

        store.clear_stale_jobs("dep-1").unwrap();
        assert_eq!(store.completed_job_count("dep-1").unwrap(), 1);
        assert!(store.get_job("dep-1", "job-2").unwrap().is_none());
    }

    #[test]
    fn test_fail_records_message() {
        let store = MemoryDepositStore::new();
        store.fail("dep-1", Some("bad checksum")).unwrap();
        let deposit = store.get("dep-1").unwrap().unwrap();
        assert_eq!(deposit.state, DepositState::Failed);
        assert_eq!(deposit.field(fields::ERROR_MESSAGE), Some("bad checksum"));
    }
}
