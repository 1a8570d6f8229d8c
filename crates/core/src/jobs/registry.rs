//! Static job registry.
//!
//! Jobs are resolved by class identifier from a fixed, enumerable set of
//! registered constructors rather than by dynamic lookup.

use std::collections::HashMap;

use thiserror::Error;

use super::Job;

/// Constructor for a job instance, taking (job_id, deposit_id).
pub type JobConstructor = fn(job_id: String, deposit_id: String) -> Box<dyn Job>;

/// Error type for job resolution.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown job class: {0}")]
    UnknownClass(String),
}

/// Fixed map from job class identifiers to constructors.
#[derive(Default)]
pub struct JobRegistry {
    constructors: HashMap<&'static str, JobConstructor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job class. Later registrations replace earlier ones.
    pub fn register(mut self, class_name: &'static str, constructor: JobConstructor) -> Self {
        self.constructors.insert(class_name, constructor);
        self
    }

    /// Instantiate a job by class identifier.
    pub fn instantiate(
        &self,
        class_name: &str,
        job_id: &str,
        deposit_id: &str,
    ) -> Result<Box<dyn Job>, RegistryError> {
        let constructor = self
            .constructors
            .get(class_name)
            .ok_or_else(|| RegistryError::UnknownClass(class_name.to_string()))?;
        Ok(constructor(job_id.to_string(), deposit_id.to_string()))
    }

    /// The registered class identifiers.
    pub fn class_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
