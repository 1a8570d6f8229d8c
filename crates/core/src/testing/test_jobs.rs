//! Controllable jobs with fixed behavior, one per outcome class.

use async_trait::async_trait;

use crate::jobs::{Job, JobContext, JobError, JobRegistry};

pub const SUCCEED_JOB: &str = "SucceedJob";
pub const DOMAIN_FAIL_JOB: &str = "DomainFailJob";
pub const EXPLODE_JOB: &str = "ExplodeJob";
pub const CHECKPOINT_JOB: &str = "CheckpointJob";

/// Completes immediately.
pub struct SucceedJob;

#[async_trait]
impl Job for SucceedJob {
    fn class_name(&self) -> &'static str {
        SUCCEED_JOB
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        Ok(())
    }
}

/// Fails with an explicit domain failure.
pub struct DomainFailJob;

#[async_trait]
impl Job for DomainFailJob {
    fn class_name(&self) -> &'static str {
        DOMAIN_FAIL_JOB
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        Err(JobError::domain("bad checksum"))
    }
}

/// Fails with an unclassified error carrying a foreign class name.
pub struct ExplodeJob;

#[async_trait]
impl Job for ExplodeJob {
    fn class_name(&self) -> &'static str {
        EXPLODE_JOB
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        Err(JobError::unclassified("NullPointerException", "boom"))
    }
}

/// Observes one interruption checkpoint, then completes. Interrupts when
/// the deposit is no longer running at the checkpoint.
pub struct CheckpointJob;

#[async_trait]
impl Job for CheckpointJob {
    fn class_name(&self) -> &'static str {
        CHECKPOINT_JOB
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        ctx.check_interrupted()?;
        Ok(())
    }
}

fn succeed(_job_id: String, _deposit_id: String) -> Box<dyn Job> {
    Box::new(SucceedJob)
}

fn domain_fail(_job_id: String, _deposit_id: String) -> Box<dyn Job> {
    Box::new(DomainFailJob)
}

fn explode(_job_id: String, _deposit_id: String) -> Box<dyn Job> {
    Box::new(ExplodeJob)
}

fn checkpoint(_job_id: String, _deposit_id: String) -> Box<dyn Job> {
    Box::new(CheckpointJob)
}

/// A registry with every test job class registered.
pub fn test_registry() -> JobRegistry {
    JobRegistry::new()
        .register(SUCCEED_JOB, succeed)
        .register(DOMAIN_FAIL_JOB, domain_fail)
        .register(EXPLODE_JOB, explode)
        .register(CHECKPOINT_JOB, checkpoint)
}
