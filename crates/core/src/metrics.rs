//! Prometheus metrics for the deposit pipeline.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

/// Deposits registered total.
pub static DEPOSITS_REGISTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("depot_deposits_registered_total", "Total deposits registered").unwrap()
});

/// Deposits started (admitted through the gate and set running).
pub static DEPOSITS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("depot_deposits_started_total", "Total deposit starts").unwrap()
});

/// Deposits finished (reached the finished state).
pub static DEPOSITS_FINISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "depot_deposits_finished_total",
        "Total deposits finished successfully",
    )
    .unwrap()
});

/// Deposits failed total.
pub static DEPOSITS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("depot_deposits_failed_total", "Total deposits failed").unwrap()
});

/// Job outcomes by result.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("depot_job_outcomes_total", "Total job executions by outcome"),
        &["result"], // "success", "interrupted", "failure"
    )
    .unwrap()
});

/// Deposits currently holding an admission gate slot.
pub static GATE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "depot_gate_active_deposits",
        "Deposits currently holding an admission gate slot",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DEPOSITS_REGISTERED.clone()),
        Box::new(DEPOSITS_STARTED.clone()),
        Box::new(DEPOSITS_FINISHED.clone()),
        Box::new(DEPOSITS_FAILED.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(GATE_ACTIVE.clone()),
    ]
}
