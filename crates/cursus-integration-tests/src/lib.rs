//! Integration test crate for the Cursus ledger.
//!
//! Exercises end-to-end flows across the workspace crates against a
//! file-backed SQLite database, so that separate connections on separate
//! threads contend the way separate service instances do.
//!
//! ```sh
//! cargo test -p cursus-integration-tests
//! ```
//!
//! The library only holds fixtures shared by the tests.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tempfile::TempDir;

use cursus_access::admin;
use cursus_db::queries::courses;
use cursus_db::RetryPolicy;
use cursus_types::course::{Course, CourseStatus, Lesson};
use cursus_types::identity::VerifiedIdentity;

/// Fixed clock for deterministic tests.
pub const NOW: u64 = 1_700_000_000;

/// Generous retry policy for heavily contended tests.
pub const CONTENDED: RetryPolicy = RetryPolicy {
    max_attempts: 50,
    backoff: Duration::from_millis(5),
};

/// A database file in a temporary directory, removed on drop.
pub struct Ledger {
    _dir: TempDir,
    path: PathBuf,
}

impl Ledger {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.db");
        // Create the file and run migrations once, up front.
        drop(cursus_db::open(&path).expect("create db"));
        Self { _dir: dir, path }
    }

    /// A fresh connection, as a separate service instance would hold.
    pub fn connect(&self) -> Connection {
        cursus_db::open_with_busy_timeout(&self.path, 10_000).expect("open db")
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Lesson ids `l01..` used by [`seed_course`].
pub fn lesson_id(i: u32) -> String {
    format!("l{i:02}")
}

/// A published open course with `lessons` published lessons in module `m1`.
pub fn seed_course(conn: &Connection, course_id: &str, lessons: u32) {
    courses::upsert(
        conn,
        &Course {
            id: course_id.into(),
            title: format!("Course {course_id}"),
            is_published: true,
            status: CourseStatus::Open,
            lesson_count: lessons,
            content_revision: 1,
        },
    )
    .expect("course");
    for i in 1..=lessons {
        courses::upsert_lesson(
            conn,
            &Lesson {
                id: lesson_id(i),
                course_id: course_id.into(),
                module_id: "m1".into(),
                title: format!("Lesson {i}"),
                position: i,
                is_published: true,
            },
        )
        .expect("lesson");
    }
}

pub fn admin() -> VerifiedIdentity {
    VerifiedIdentity::admin("ops")
}

/// Manually grant `user_id` access to `course_id`.
pub fn enroll_active(conn: &mut Connection, user_id: &str, course_id: &str) {
    admin::open_enrollment(conn, RetryPolicy::default(), &admin(), user_id, course_id, NOW)
        .expect("enroll");
}
