//! Deposit data model and status store.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteDepositStore;
pub use store::{try_supervise, DepositError, DepositStore, SupervisorGuard};
pub use types::{fields, Deposit, DepositState, JobRecord, JobStatus};
