//! Lesson-progress queries, keyed by `(user_id, course_id, lesson_id)`.

use rusqlite::{Connection, OptionalExtension};

use cursus_types::enrollment::ProgressAggregate;
use cursus_types::progress::LessonProgress;

use super::{courses, opt_i64, opt_u64, status_column};
use crate::Result;

const COLUMNS: &str = "user_id, course_id, module_id, lesson_id, status, percent, \
     max_watched_second, completed_at, updated_at";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LessonProgress> {
    Ok(LessonProgress {
        user_id: row.get(0)?,
        course_id: row.get(1)?,
        module_id: row.get(2)?,
        lesson_id: row.get(3)?,
        status: status_column(row, 4)?,
        percent: row.get::<_, i64>(5)? as u8,
        max_watched_second: row.get::<_, i64>(6)? as u64,
        completed_at: opt_u64(row, 7)?,
        updated_at: row.get::<_, i64>(8)? as u64,
    })
}

/// Find the progress record for one lesson.
pub fn find(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    lesson_id: &str,
) -> Result<Option<LessonProgress>> {
    let progress = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM lesson_progress
                 WHERE user_id = ?1 AND course_id = ?2 AND lesson_id = ?3"
            ),
            [user_id, course_id, lesson_id],
            from_row,
        )
        .optional()?;
    Ok(progress)
}

/// Write a progress record, replacing any previous version.
///
/// Monotonicity is the caller's responsibility; this is a plain write.
pub fn upsert(conn: &Connection, p: &LessonProgress) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO lesson_progress ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, course_id, lesson_id) DO UPDATE SET
                module_id = excluded.module_id,
                status = excluded.status,
                percent = excluded.percent,
                max_watched_second = excluded.max_watched_second,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at"
        ),
        rusqlite::params![
            p.user_id,
            p.course_id,
            p.module_id,
            p.lesson_id,
            p.status.as_str(),
            p.percent as i64,
            p.max_watched_second as i64,
            opt_i64(p.completed_at),
            p.updated_at as i64,
        ],
    )?;
    Ok(())
}

/// Ids of the course's published lessons the user has completed.
///
/// Completions of lessons that were later unpublished or removed do not count.
pub fn completed_published_lesson_ids(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT p.lesson_id FROM lesson_progress p
         JOIN lessons l ON l.course_id = p.course_id AND l.lesson_id = p.lesson_id
         WHERE p.user_id = ?1 AND p.course_id = ?2
           AND p.status = 'completed' AND l.is_published = 1
         ORDER BY l.position, p.lesson_id",
    )?;
    let ids = stmt
        .query_map([user_id, course_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// The aggregate the lesson records imply: completed published lessons
/// over the live published-lesson count.
///
/// Falls back to the course's cached `lesson_count` when the catalog mirror
/// holds no lesson rows for the course.
pub fn derive_aggregate(conn: &Connection, user_id: &str, course_id: &str) -> Result<ProgressAggregate> {
    let completed = completed_published_lesson_ids(conn, user_id, course_id)?.len() as u32;
    let live_total = courses::published_lesson_ids(conn, course_id)?.len() as u32;
    let total = if live_total == 0 {
        courses::get(conn, course_id)?.lesson_count
    } else {
        live_total
    };
    Ok(ProgressAggregate::new(completed, total))
}
