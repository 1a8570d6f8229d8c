//! SQLite-backed deposit status store implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{DepositError, DepositStore};
use super::types::{Deposit, DepositState, JobRecord, JobStatus};

/// SQLite-backed deposit store.
///
/// A single connection behind a mutex; every operation on it is serialized,
/// which gives the fail-fast lock insert and the queue pop their required
/// atomicity within one process.
pub struct SqliteDepositStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> DepositError {
    DepositError::Storage(e.to_string())
}

impl SqliteDepositStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, DepositError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, DepositError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DepositError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS deposits (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deposit_fields (
                deposit_id TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (deposit_id, field)
            );

            CREATE TABLE IF NOT EXISTS deposit_queue (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                deposit_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deposit_locks (
                deposit_id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                acquired_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deposit_jobs (
                deposit_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                class_name TEXT NOT NULL,
                status TEXT NOT NULL,
                completed_steps INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (deposit_id, job_id)
            );
            "#,
        )
        .map_err(db_err)
    }

    /// Insert the deposit row if it does not exist yet.
    fn ensure_deposit(conn: &Connection, id: &str) -> Result<(), DepositError> {
        conn.execute(
            "INSERT OR IGNORE INTO deposits (id, state, updated_at) VALUES (?, ?, ?)",
            params![
                id,
                DepositState::Unregistered.as_str(),
                Utc::now().to_rfc3339()
            ],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn load_fields(conn: &Connection, id: &str) -> Result<HashMap<String, String>, DepositError> {
        let mut stmt = conn
            .prepare("SELECT field, value FROM deposit_fields WHERE deposit_id = ?")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;

        let mut fields = HashMap::new();
        for row in rows {
            let (field, value) = row.map_err(db_err)?;
            fields.insert(field, value);
        }
        Ok(fields)
    }

    fn set_job_status(
        &self,
        deposit_id: &str,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE deposit_jobs SET status = ?, updated_at = ? WHERE deposit_id = ? AND job_id = ?",
            params![status.as_str(), Utc::now().to_rfc3339(), deposit_id, job_id],
        )
        .map(|_| ())
        .map_err(db_err)
    }
}

impl DepositStore for SqliteDepositStore {
    fn get(&self, id: &str) -> Result<Option<Deposit>, DepositError> {
        let conn = self.conn.lock().unwrap();

        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM deposits WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let Some(state) = state else {
            return Ok(None);
        };
        let state = DepositState::parse(&state)
            .ok_or_else(|| DepositError::Storage(format!("invalid state '{state}' for {id}")))?;
        let fields = Self::load_fields(&conn, id)?;

        Ok(Some(Deposit {
            id: id.to_string(),
            state,
            fields,
        }))
    }

    fn set_field(&self, id: &str, field: &str, value: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_deposit(&conn, id)?;
        conn.execute(
            "INSERT INTO deposit_fields (deposit_id, field, value) VALUES (?, ?, ?)
             ON CONFLICT (deposit_id, field) DO UPDATE SET value = excluded.value",
            params![id, field, value],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn delete_field(&self, id: &str, field: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM deposit_fields WHERE deposit_id = ? AND field = ?",
            params![id, field],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn get_state(&self, id: &str) -> Result<DepositState, DepositError> {
        let conn = self.conn.lock().unwrap();
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM deposits WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match state {
            Some(s) => DepositState::parse(&s)
                .ok_or_else(|| DepositError::Storage(format!("invalid state '{s}' for {id}"))),
            None => Ok(DepositState::Unregistered),
        }
    }

    fn set_state(&self, id: &str, state: DepositState) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_deposit(&conn, id)?;
        conn.execute(
            "UPDATE deposits SET state = ?, updated_at = ? WHERE id = ?",
            params![state.as_str(), Utc::now().to_rfc3339(), id],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn queue_deposit(&self, id: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_deposit(&conn, id)?;
        conn.execute(
            "INSERT INTO deposit_queue (deposit_id) VALUES (?)",
            params![id],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn peek_next_queued(&self) -> Result<Option<String>, DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT deposit_id FROM deposit_queue ORDER BY seq ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    fn take_next_queued(&self) -> Result<Option<String>, DepositError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let head: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, deposit_id FROM deposit_queue ORDER BY seq ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        let result = match head {
            Some((seq, deposit_id)) => {
                tx.execute("DELETE FROM deposit_queue WHERE seq = ?", params![seq])
                    .map_err(db_err)?;
                Some(deposit_id)
            }
            None => None,
        };

        tx.commit().map_err(db_err)?;
        Ok(result)
    }

    fn add_supervisor_lock(&self, id: &str, owner: &str) -> Result<bool, DepositError> {
        let conn = self.conn.lock().unwrap();
        // Fail-fast: the primary key rejects a second insert while held.
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO deposit_locks (deposit_id, owner, acquired_at) VALUES (?, ?, ?)",
                params![id, owner, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(inserted == 1)
    }

    fn remove_supervisor_lock(&self, id: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM deposit_locks WHERE deposit_id = ?", params![id])
            .map(|_| ())
            .map_err(db_err)
    }

    fn get_all(&self) -> Result<Vec<Deposit>, DepositError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, state FROM deposits ORDER BY id ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;

        let mut deposits = Vec::new();
        for row in rows {
            let (id, state) = row.map_err(db_err)?;
            let state = DepositState::parse(&state)
                .ok_or_else(|| DepositError::Storage(format!("invalid state '{state}' for {id}")))?;
            let fields = Self::load_fields(&conn, &id)?;
            deposits.push(Deposit { id, state, fields });
        }
        Ok(deposits)
    }

    fn fail(&self, id: &str, message: Option<&str>) -> Result<(), DepositError> {
        if let Some(message) = message {
            self.set_field(id, super::types::fields::ERROR_MESSAGE, message)?;
        }
        self.set_state(id, DepositState::Failed)
    }

    fn record_job_started(
        &self,
        deposit_id: &str,
        job_id: &str,
        class_name: &str,
    ) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO deposit_jobs (deposit_id, job_id, class_name, status, completed_steps, updated_at)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT (deposit_id, job_id) DO UPDATE SET
                 class_name = excluded.class_name,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            params![
                deposit_id,
                job_id,
                class_name,
                JobStatus::Running.as_str(),
                Utc::now().to_rfc3339()
            ],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn record_job_completed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE deposit_jobs SET status = ?, completed_steps = completed_steps + 1, updated_at = ?
             WHERE deposit_id = ? AND job_id = ?",
            params![
                JobStatus::Completed.as_str(),
                Utc::now().to_rfc3339(),
                deposit_id,
                job_id
            ],
        )
        .map(|_| ())
        .map_err(db_err)
    }

    fn record_job_interrupted(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        self.set_job_status(deposit_id, job_id, JobStatus::Interrupted)
    }

    fn record_job_failed(&self, deposit_id: &str, job_id: &str) -> Result<(), DepositError> {
        self.set_job_status(deposit_id, job_id, JobStatus::Failed)
    }

    fn get_job(&self, deposit_id: &str, job_id: &str) -> Result<Option<JobRecord>, DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT job_id, deposit_id, class_name, status, completed_steps
             FROM deposit_jobs WHERE deposit_id = ? AND job_id = ?",
            params![deposit_id, job_id],
            |row| {
                let status: String = row.get(3)?;
                Ok(JobRecord {
                    job_id: row.get(0)?,
                    deposit_id: row.get(1)?,
                    class_name: row.get(2)?,
                    status: JobStatus::parse(&status).unwrap_or(JobStatus::Failed),
                    completed_steps: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    fn completed_job_count(&self, deposit_id: &str) -> Result<u32, DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM deposit_jobs WHERE deposit_id = ? AND status = ?",
            params![deposit_id, JobStatus::Completed.as_str()],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn clear_stale_jobs(&self, deposit_id: &str) -> Result<(), DepositError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM deposit_jobs WHERE deposit_id = ? AND status != ?",
            params![deposit_id, JobStatus::Completed.as_str()],
        )
        .map(|_| ())
        .map_err(db_err)
    }
}
