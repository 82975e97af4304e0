//! The transactional primitive every read-modify-write runs through.
//!
//! A body closure receives a [`Transaction`] opened with `BEGIN IMMEDIATE`,
//! so the snapshot it reads is already protected by the write lock: two
//! writers to the same enrollment are serialized and neither can act on a
//! stale read. When SQLite reports BUSY or LOCKED (the busy timeout ran out),
//! the whole body is re-run from a fresh snapshot, a bounded number of times.
//!
//! Bodies must therefore be free of side effects outside the transaction.

use std::time::Duration;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

use crate::DbError;

/// Bounds on [`transact`] retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Base backoff; attempt `n` sleeps `n * backoff` before re-running.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(20),
        }
    }
}

/// Errors that can tell whether they came from write contention.
pub trait Retryable {
    fn is_conflict(&self) -> bool;
}

impl Retryable for rusqlite::Error {
    fn is_conflict(&self) -> bool {
        matches!(
            self,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

impl Retryable for DbError {
    fn is_conflict(&self) -> bool {
        match self {
            DbError::Conflict { .. } => true,
            DbError::Sqlite(e) => e.is_conflict(),
            _ => false,
        }
    }
}

/// Run `body` inside an immediate transaction, retrying on contention.
///
/// The body's error type only needs to absorb [`DbError`] and classify
/// conflicts, so domain crates can return their own errors from inside the
/// transaction and have them abort it.
///
/// # Errors
///
/// - Whatever the body returns; the transaction is rolled back
/// - [`DbError::Conflict`] (converted into `E`) once every attempt hit contention
pub fn transact<T, E, F>(conn: &mut Connection, policy: RetryPolicy, mut body: F) -> Result<T, E>
where
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
    E: Retryable + From<DbError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match run_once(conn, &mut body) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() => {
                if attempt >= max_attempts {
                    tracing::warn!(attempts = attempt, "transaction conflict, giving up");
                    return Err(DbError::Conflict { attempts: attempt }.into());
                }
                tracing::debug!(attempt, "transaction conflict, retrying");
                std::thread::sleep(policy.backoff * attempt);
            }
            Err(err) => return Err(err),
        }
    }
}

fn run_once<T, E, F>(conn: &mut Connection, body: &mut F) -> Result<T, E>
where
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
    E: From<DbError>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DbError::from)?;
    // Dropping `tx` on the error path rolls back.
    let value = body(&tx)?;
    tx.commit().map_err(DbError::from)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    fn insert_course(tx: &Transaction<'_>, id: &str) -> crate::Result<()> {
        tx.execute(
            "INSERT INTO courses (course_id, title) VALUES (?1, 'T')",
            [id],
        )?;
        Ok(())
    }

    fn course_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
            .expect("count")
    }

    #[test]
    fn test_commit_on_success() {
        let mut conn = crate::open_memory().expect("open");
        transact(&mut conn, quick(3), |tx| insert_course(tx, "c1")).expect("transact");
        assert_eq!(course_count(&conn), 1);
    }

    #[test]
    fn test_rollback_on_error() {
        let mut conn = crate::open_memory().expect("open");
        let result: crate::Result<()> = transact(&mut conn, quick(3), |tx| {
            insert_course(tx, "c1")?;
            Err(DbError::NotFound("later step".into()))
        });
        assert!(matches!(result, Err(DbError::NotFound(_))));
        assert_eq!(course_count(&conn), 0);
    }

    #[test]
    fn test_conflict_is_retried_from_fresh_snapshot() {
        let mut conn = crate::open_memory().expect("open");
        let mut calls = 0;
        transact(&mut conn, quick(3), |tx| {
            calls += 1;
            insert_course(tx, "c1")?;
            if calls == 1 {
                return Err(DbError::Conflict { attempts: 0 });
            }
            Ok(())
        })
        .expect("second attempt commits");
        assert_eq!(calls, 2);
        // The first attempt's insert was rolled back.
        assert_eq!(course_count(&conn), 1);
    }

    #[test]
    fn test_non_conflict_errors_are_not_retried() {
        let mut conn = crate::open_memory().expect("open");
        let mut calls = 0;
        let result: crate::Result<()> = transact(&mut conn, quick(5), |_| {
            calls += 1;
            Err(DbError::Constraint("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_busy_database_surfaces_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cursus.db");
        let mut holder = crate::open(&path).expect("open holder");
        let mut contender = crate::open_with_busy_timeout(&path, 0).expect("open contender");

        let lock = holder
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .expect("hold write lock");

        let result: crate::Result<()> =
            transact(&mut contender, quick(2), |tx| insert_course(tx, "c1"));
        assert!(matches!(result, Err(DbError::Conflict { attempts: 2 })));

        lock.rollback().expect("release");
        transact(&mut contender, quick(2), |tx| insert_course(tx, "c1"))
            .expect("succeeds once the lock is released");
    }

    #[test]
    fn test_busy_error_classified_as_conflict() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(busy.is_conflict());
        assert!(DbError::Sqlite(busy).is_conflict());
        assert!(!DbError::NotFound("x".into()).is_conflict());
    }
}
