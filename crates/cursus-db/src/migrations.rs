//! Forward-only schema migrations.
//!
//! The applied version lives in `PRAGMA user_version`. Each step runs in its
//! own transaction together with the version bump, so a crash mid-step leaves
//! the previous version intact.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Ordered migration steps. Index `i` upgrades the ledger to version `i + 1`.
const STEPS: &[&str] = &[schema::SCHEMA_V1];

fn user_version(conn: &Connection) -> Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(DbError::Sqlite)
}

/// Bring the ledger schema up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// - [`DbError::Migration`] if the file was written by a newer build or no
///   step exists for a pending version
pub fn run(conn: &Connection) -> Result<()> {
    let found = user_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "ledger schema v{found} is newer than this build (v{SCHEMA_VERSION})"
        )));
    }

    for target in (found + 1)..=SCHEMA_VERSION {
        let sql = STEPS
            .get(target as usize - 1)
            .ok_or_else(|| DbError::Migration(format!("no migration step for v{target}")))?;
        tracing::info!(version = target, "applying ledger migration");
        // user_version is transactional in SQLite.
        conn.execute_batch(&format!(
            "BEGIN IMMEDIATE;\n{sql}\nPRAGMA user_version = {target};\nCOMMIT;"
        ))
        .map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK;");
            DbError::Migration(format!("step v{target} failed: {e}"))
        })?;
    }

    Ok(())
}
