//! Certificate eligibility.
//!
//! When the catalog mirror lists the course's lessons, every published lesson
//! must have a completed progress record. Lessons added after enrollment
//! therefore count, whatever the cached aggregate says. Without lesson rows
//! the cached aggregate must read 100%.

use rusqlite::Connection;

use cursus_db::queries::{courses, progress};
use cursus_types::enrollment::{Enrollment, ProgressAggregate};

use crate::{CertificateError, Result};

/// Facts established by a successful eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    /// Published lesson ids in curriculum order; empty when the catalog
    /// mirror holds no lesson rows.
    pub lesson_ids: Vec<String>,
    /// Aggregate to store on the enrollment once the certificate is issued.
    pub aggregate: ProgressAggregate,
}

impl Eligibility {
    pub fn lessons_considered(&self) -> u32 {
        self.aggregate.total_lessons
    }
}

/// Check that `enrollment` has completed its course.
///
/// # Errors
///
/// - [`CertificateError::NotComplete`] with the completed/required counts
pub fn check(conn: &Connection, enrollment: &Enrollment) -> Result<Eligibility> {
    let lesson_ids = courses::published_lesson_ids(conn, &enrollment.course_id)?;

    let aggregate = if lesson_ids.is_empty() {
        enrollment.progress
    } else {
        let completed = progress::completed_published_lesson_ids(
            conn,
            &enrollment.user_id,
            &enrollment.course_id,
        )?;
        ProgressAggregate::new(completed.len() as u32, lesson_ids.len() as u32)
    };

    let complete = if lesson_ids.is_empty() {
        aggregate.is_complete()
    } else {
        aggregate.completed_lesson_count >= aggregate.total_lessons
    };
    if !complete {
        return Err(CertificateError::NotComplete {
            completed: aggregate.completed_lesson_count,
            required: aggregate.total_lessons,
            percent: aggregate.percent,
        });
    }

    Ok(Eligibility {
        lesson_ids,
        aggregate,
    })
}
