//! Enrollment queries, keyed by `(user_id, course_id)`.

use rusqlite::{Connection, OptionalExtension};

use cursus_types::enrollment::{Enrollment, ProgressAggregate};

use super::{opt_i64, opt_u64, status_column};
use crate::{DbError, Result};

const COLUMNS: &str = "user_id, course_id, status, payment_status, approval_status, \
     subscription_status, completed_lesson_count, total_lessons, percent, course_revision, \
     created_at, updated_at, paid_at, approved_at, last_accessed_at, completed_at, access_until";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        user_id: row.get(0)?,
        course_id: row.get(1)?,
        status: status_column(row, 2)?,
        payment_status: status_column(row, 3)?,
        approval_status: status_column(row, 4)?,
        subscription_status: status_column(row, 5)?,
        progress: ProgressAggregate {
            completed_lesson_count: row.get::<_, i64>(6)? as u32,
            total_lessons: row.get::<_, i64>(7)? as u32,
            percent: row.get::<_, i64>(8)? as u8,
        },
        course_revision: row.get::<_, i64>(9)? as u32,
        created_at: row.get::<_, i64>(10)? as u64,
        updated_at: row.get::<_, i64>(11)? as u64,
        paid_at: opt_u64(row, 12)?,
        approved_at: opt_u64(row, 13)?,
        last_accessed_at: opt_u64(row, 14)?,
        completed_at: opt_u64(row, 15)?,
        access_until: opt_u64(row, 16)?,
    })
}

/// Find the enrollment for a pair.
pub fn find(conn: &Connection, user_id: &str, course_id: &str) -> Result<Option<Enrollment>> {
    let enrollment = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM enrollments WHERE user_id = ?1 AND course_id = ?2"),
            [user_id, course_id],
            from_row,
        )
        .optional()?;
    Ok(enrollment)
}

/// Get the enrollment for a pair.
pub fn get(conn: &Connection, user_id: &str, course_id: &str) -> Result<Enrollment> {
    find(conn, user_id, course_id)?.ok_or_else(|| {
        DbError::NotFound(format!("enrollment for user '{user_id}' in course '{course_id}'"))
    })
}

/// Insert a new enrollment. Fails with [`DbError::Constraint`] if the pair
/// already exists or the course is unknown.
pub fn insert(conn: &Connection, e: &Enrollment) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO enrollments ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        rusqlite::params![
            e.user_id,
            e.course_id,
            e.status.as_str(),
            e.payment_status.as_str(),
            e.approval_status.as_str(),
            e.subscription_status.as_str(),
            e.progress.completed_lesson_count as i64,
            e.progress.total_lessons as i64,
            e.progress.percent as i64,
            e.course_revision as i64,
            e.created_at as i64,
            e.updated_at as i64,
            opt_i64(e.paid_at),
            opt_i64(e.approved_at),
            opt_i64(e.last_accessed_at),
            opt_i64(e.completed_at),
            opt_i64(e.access_until),
        ],
    )
    .map_err(|err| DbError::from_insert(err, "enrollment"))?;
    Ok(())
}

/// Write every mutable field of an existing enrollment.
pub fn update(conn: &Connection, e: &Enrollment) -> Result<()> {
    let updated = conn.execute(
        "UPDATE enrollments SET
            status = ?3, payment_status = ?4, approval_status = ?5, subscription_status = ?6,
            completed_lesson_count = ?7, total_lessons = ?8, percent = ?9, course_revision = ?10,
            updated_at = ?11, paid_at = ?12, approved_at = ?13, last_accessed_at = ?14,
            completed_at = ?15, access_until = ?16
         WHERE user_id = ?1 AND course_id = ?2",
        rusqlite::params![
            e.user_id,
            e.course_id,
            e.status.as_str(),
            e.payment_status.as_str(),
            e.approval_status.as_str(),
            e.subscription_status.as_str(),
            e.progress.completed_lesson_count as i64,
            e.progress.total_lessons as i64,
            e.progress.percent as i64,
            e.course_revision as i64,
            e.updated_at as i64,
            opt_i64(e.paid_at),
            opt_i64(e.approved_at),
            opt_i64(e.last_accessed_at),
            opt_i64(e.completed_at),
            opt_i64(e.access_until),
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!(
            "enrollment for user '{}' in course '{}'",
            e.user_id, e.course_id
        )));
    }
    Ok(())
}

/// Hard-delete an enrollment. Returns whether a row was removed.
pub fn delete(conn: &Connection, user_id: &str, course_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
        [user_id, course_id],
    )?;
    Ok(deleted > 0)
}

/// All enrollments of a user, most recently updated first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Enrollment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM enrollments WHERE user_id = ?1 ORDER BY updated_at DESC, course_id"
    ))?;
    let rows = stmt
        .query_map([user_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
