//! # cursus-db
//!
//! The enrollment store: a single SQLite database at
//! `$CURSUS_DATA_DIR/cursus.db` holding the course catalog mirror,
//! enrollments, lesson progress, certificates, the payment-signal ledger and
//! the audit log.
//!
//! ## Conventions
//!
//! - WAL mode, foreign keys enforced
//! - All timestamps are Unix epoch seconds (u64)
//! - Status columns hold the snake_case strings of the `cursus-types` enums,
//!   guarded by `CHECK` constraints and parsed back on read
//! - Schema version stored in `PRAGMA user_version`
//! - Every read-modify-write goes through [`transact`]

pub mod migrations;
pub mod queries;
pub mod schema;
pub mod transaction;

use rusqlite::{Connection, ErrorCode};
use std::path::Path;

pub use transaction::{transact, RetryPolicy, Retryable};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Default time SQLite waits on a locked database before reporting BUSY.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Concurrent writers kept the database busy for every attempt.
    #[error("transaction conflict after {attempts} attempts")]
    Conflict { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Map a uniqueness/foreign-key failure to [`DbError::Constraint`].
    pub(crate) fn from_insert(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                DbError::Constraint(format!("{what}: {err}"))
            }
            _ => DbError::Sqlite(err),
        }
    }
}

/// Open or create the database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
}

/// Like [`open`], with an explicit busy timeout in milliseconds.
pub fn open_with_busy_timeout(path: &Path, busy_timeout_ms: u32) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout_ms)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, DEFAULT_BUSY_TIMEOUT_MS)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection, busy_timeout_ms: u32) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_file_db_uses_wal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open(&dir.path().join("cursus.db")).expect("open");
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("get journal_mode");
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_busy_timeout_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_with_busy_timeout(&dir.path().join("cursus.db"), 250).expect("open");
        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("get busy_timeout");
        assert_eq!(timeout, 250);
    }
}
