//! Certificate queries.

use rusqlite::{Connection, OptionalExtension};

use cursus_types::certificate::{Certificate, CertificateStatus};

use super::status_column;
use crate::Result;

const COLUMNS: &str = "certificate_id, code, user_id, course_id, issued_at, course_revision, \
     lessons_considered, integrity_hash, issued_by, status";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        code: row.get(1)?,
        user_id: row.get(2)?,
        course_id: row.get(3)?,
        issued_at: row.get::<_, i64>(4)? as u64,
        course_revision: row.get::<_, i64>(5)? as u32,
        lessons_considered: row.get::<_, i64>(6)? as u32,
        integrity_hash: row.get(7)?,
        issued_by: row.get(8)?,
        status: status_column(row, 9)?,
    })
}

/// Find the certificate issued for a pair.
pub fn find_by_pair(conn: &Connection, user_id: &str, course_id: &str) -> Result<Option<Certificate>> {
    let cert = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM certificates WHERE user_id = ?1 AND course_id = ?2"),
            [user_id, course_id],
            from_row,
        )
        .optional()?;
    Ok(cert)
}

/// Find a certificate by its public verification code.
pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<Certificate>> {
    let cert = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM certificates WHERE code = ?1"),
            [code],
            from_row,
        )
        .optional()?;
    Ok(cert)
}

/// Create the certificate unless one already exists for its id, pair or code.
///
/// Returns `true` if this call stored the row. On `false` the caller must
/// re-read by pair: either another request won the race, or the code collided.
pub fn insert_if_absent(conn: &Connection, c: &Certificate) -> Result<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO certificates ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        rusqlite::params![
            c.id,
            c.code,
            c.user_id,
            c.course_id,
            c.issued_at as i64,
            c.course_revision as i64,
            c.lessons_considered as i64,
            c.integrity_hash,
            c.issued_by,
            c.status.as_str(),
        ],
    )?;
    Ok(inserted == 1)
}

/// Certificates held by a user, newest first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Certificate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM certificates WHERE user_id = ?1 ORDER BY issued_at DESC, course_id"
    ))?;
    let rows = stmt
        .query_map([user_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Change a certificate's status. Returns whether a row changed.
pub fn set_status(conn: &Connection, code: &str, status: CertificateStatus) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE certificates SET status = ?1 WHERE code = ?2 AND status <> ?1",
        rusqlite::params![status.as_str(), code],
    )?;
    Ok(updated > 0)
}
