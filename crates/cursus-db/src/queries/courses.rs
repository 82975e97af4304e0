//! Course catalog queries.
//!
//! The ledger reads these tables; the upserts exist for the catalog sync
//! performed by the content side and for tests.

use rusqlite::{Connection, OptionalExtension};

use cursus_types::course::{Course, Lesson};

use super::status_column;
use crate::{DbError, Result};

const COURSE_COLUMNS: &str =
    "course_id, title, is_published, status, lesson_count, content_revision";

fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        is_published: row.get(2)?,
        status: status_column(row, 3)?,
        lesson_count: row.get::<_, i64>(4)? as u32,
        content_revision: row.get::<_, i64>(5)? as u32,
    })
}

/// Insert or replace a course.
pub fn upsert(conn: &Connection, course: &Course) -> Result<()> {
    conn.execute(
        "INSERT INTO courses (course_id, title, is_published, status, lesson_count, content_revision)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(course_id) DO UPDATE SET
            title = excluded.title,
            is_published = excluded.is_published,
            status = excluded.status,
            lesson_count = excluded.lesson_count,
            content_revision = excluded.content_revision",
        rusqlite::params![
            course.id,
            course.title,
            course.is_published,
            course.status.as_str(),
            course.lesson_count as i64,
            course.content_revision as i64,
        ],
    )?;
    Ok(())
}

/// Find a course by id.
pub fn find(conn: &Connection, course_id: &str) -> Result<Option<Course>> {
    let course = conn
        .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE course_id = ?1"),
            [course_id],
            course_from_row,
        )
        .optional()?;
    Ok(course)
}

/// Get a course by id.
pub fn get(conn: &Connection, course_id: &str) -> Result<Course> {
    find(conn, course_id)?.ok_or_else(|| DbError::NotFound(format!("course '{course_id}'")))
}

/// Insert or replace a lesson.
pub fn upsert_lesson(conn: &Connection, lesson: &Lesson) -> Result<()> {
    conn.execute(
        "INSERT INTO lessons (course_id, lesson_id, module_id, title, position, is_published)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(course_id, lesson_id) DO UPDATE SET
            module_id = excluded.module_id,
            title = excluded.title,
            position = excluded.position,
            is_published = excluded.is_published",
        rusqlite::params![
            lesson.course_id,
            lesson.id,
            lesson.module_id,
            lesson.title,
            lesson.position as i64,
            lesson.is_published,
        ],
    )
    .map_err(|e| DbError::from_insert(e, "lesson references unknown course"))?;
    Ok(())
}

/// Resolve a lesson reference. Returns `None` unless the lesson exists under
/// exactly this course and module.
pub fn find_lesson(
    conn: &Connection,
    course_id: &str,
    module_id: &str,
    lesson_id: &str,
) -> Result<Option<Lesson>> {
    let lesson = conn
        .query_row(
            "SELECT lesson_id, course_id, module_id, title, position, is_published
             FROM lessons WHERE course_id = ?1 AND module_id = ?2 AND lesson_id = ?3",
            rusqlite::params![course_id, module_id, lesson_id],
            |row| {
                Ok(Lesson {
                    id: row.get(0)?,
                    course_id: row.get(1)?,
                    module_id: row.get(2)?,
                    title: row.get(3)?,
                    position: row.get::<_, i64>(4)? as u32,
                    is_published: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(lesson)
}

/// Ids of the published lessons of a course, in curriculum order.
pub fn published_lesson_ids(conn: &Connection, course_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT lesson_id FROM lessons
         WHERE course_id = ?1 AND is_published = 1
         ORDER BY position, lesson_id",
    )?;
    let ids = stmt
        .query_map([course_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cursus_types::course::CourseStatus;

    pub(crate) fn sample_course(id: &str, lesson_count: u32) -> Course {
        Course {
            id: id.to_string(),
            title: format!("Course {id}"),
            is_published: true,
            status: CourseStatus::Open,
            lesson_count,
            content_revision: 1,
        }
    }

    pub(crate) fn sample_lesson(course_id: &str, module_id: &str, id: &str, position: u32) -> Lesson {
        Lesson {
            id: id.to_string(),
            course_id: course_id.to_string(),
            module_id: module_id.to_string(),
            title: format!("Lesson {id}"),
            position,
            is_published: true,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = crate::open_memory().expect("open");
        let mut course = sample_course("c1", 3);
        upsert(&conn, &course).expect("insert");
        assert_eq!(get(&conn, "c1").expect("get"), course);

        course.status = CourseStatus::Closed;
        upsert(&conn, &course).expect("update");
        assert_eq!(get(&conn, "c1").expect("get").status, CourseStatus::Closed);
    }

    #[test]
    fn test_missing_course() {
        let conn = crate::open_memory().expect("open");
        assert!(find(&conn, "nope").expect("find").is_none());
        assert!(matches!(get(&conn, "nope"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_find_lesson_requires_matching_course_and_module() {
        let conn = crate::open_memory().expect("open");
        upsert(&conn, &sample_course("c1", 1)).expect("c1");
        upsert(&conn, &sample_course("c2", 1)).expect("c2");
        upsert_lesson(&conn, &sample_lesson("c1", "m1", "l1", 1)).expect("lesson");

        assert!(find_lesson(&conn, "c1", "m1", "l1").expect("find").is_some());
        assert!(find_lesson(&conn, "c2", "m1", "l1").expect("find").is_none());
        assert!(find_lesson(&conn, "c1", "m2", "l1").expect("find").is_none());
    }

    #[test]
    fn test_lesson_for_unknown_course_is_constraint_error() {
        let conn = crate::open_memory().expect("open");
        let result = upsert_lesson(&conn, &sample_lesson("ghost", "m1", "l1", 1));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_published_lessons_in_order() {
        let conn = crate::open_memory().expect("open");
        upsert(&conn, &sample_course("c1", 0)).expect("course");
        upsert_lesson(&conn, &sample_lesson("c1", "m1", "l2", 2)).expect("l2");
        upsert_lesson(&conn, &sample_lesson("c1", "m1", "l1", 1)).expect("l1");
        let mut draft = sample_lesson("c1", "m2", "l3", 3);
        draft.is_published = false;
        upsert_lesson(&conn, &draft).expect("l3");

        assert_eq!(published_lesson_ids(&conn, "c1").expect("ids"), vec!["l1", "l2"]);
    }

    #[test]
    fn test_corrupt_status_rejected_on_read() {
        let conn = crate::open_memory().expect("open");
        upsert(&conn, &sample_course("c1", 1)).expect("course");
        conn.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             UPDATE courses SET status = 'hidden' WHERE course_id = 'c1';",
        )
        .expect("corrupt");
        assert!(matches!(get(&conn, "c1"), Err(DbError::Sqlite(_))));
    }
}
