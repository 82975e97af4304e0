//! Recording progress observations.

use rusqlite::Connection;

use cursus_access::gate;
use cursus_db::queries::{courses, enrollments, progress};
use cursus_db::{transact, RetryPolicy};
use cursus_types::enrollment::ProgressAggregate;
use cursus_types::progress::{LessonProgress, ProgressObservation};

use crate::plan::{plan_progress, LessonRef};
use crate::{ProgressError, Result};

/// Stored state after a successful observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOutcome {
    pub progress: LessonProgress,
    pub aggregate: ProgressAggregate,
    /// True only for the call that first completed the lesson.
    pub newly_completed: bool,
}

/// Record one observation for `user_id` on a lesson.
///
/// Authorizes through the access gate, checks that the lesson belongs to the
/// course and module named, then applies the planned delta to the lesson
/// record and the enrollment in one transaction.
///
/// # Errors
///
/// - [`ProgressError::Access`] if the gate denies the user
/// - [`ProgressError::InvalidContext`] if the lesson is not a published lesson
///   under the course/module
/// - [`ProgressError::EnrollmentInactive`] if the enrollment is not `active`
///   when the transaction reads it
/// - [`ProgressError::Db`] on store failures, including exhausted conflict retries
pub fn record_progress(
    conn: &mut Connection,
    retry: RetryPolicy,
    user_id: &str,
    lesson: LessonRef<'_>,
    observed: &ProgressObservation,
    now: u64,
) -> Result<ProgressOutcome> {
    gate::assert_can_access_course(conn, user_id, lesson.course_id, now)?;

    let resolved = courses::find_lesson(conn, lesson.course_id, lesson.module_id, lesson.lesson_id)?;
    if !resolved.is_some_and(|l| l.is_published) {
        tracing::warn!(
            user_id,
            course_id = lesson.course_id,
            module_id = lesson.module_id,
            lesson_id = lesson.lesson_id,
            "suspicious lesson reference"
        );
        return Err(ProgressError::InvalidContext {
            course_id: lesson.course_id.to_string(),
            module_id: lesson.module_id.to_string(),
            lesson_id: lesson.lesson_id.to_string(),
        });
    }

    let outcome = transact(conn, retry, |tx| -> Result<ProgressOutcome> {
        let enrollment = enrollments::find(tx, user_id, lesson.course_id)?
            .ok_or(ProgressError::EnrollmentInactive { status: None })?;
        let course_lesson_count = courses::get(tx, lesson.course_id)?.lesson_count;
        let existing = progress::find(tx, user_id, lesson.course_id, lesson.lesson_id)?;

        let delta = plan_progress(
            user_id,
            lesson,
            existing.as_ref(),
            &enrollment,
            observed,
            course_lesson_count,
            now,
        )?;

        progress::upsert(tx, &delta.progress)?;
        enrollments::update(tx, &delta.enrollment)?;

        Ok(ProgressOutcome {
            progress: delta.progress,
            aggregate: delta.enrollment.progress,
            newly_completed: delta.newly_completed,
        })
    })?;

    if outcome.newly_completed {
        tracing::info!(
            user_id,
            course_id = lesson.course_id,
            lesson_id = lesson.lesson_id,
            completed = outcome.aggregate.completed_lesson_count,
            total = outcome.aggregate.total_lessons,
            percent = outcome.aggregate.percent,
            "lesson completed"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursus_access::AccessError;
    use cursus_types::course::{Course, CourseStatus, Lesson};
    use cursus_types::enrollment::{ApprovalStatus, Enrollment, EnrollmentStatus, PaymentStatus};
    use cursus_types::progress::LessonStatus;

    const NOW: u64 = 1_700_000_000;

    fn setup(lessons: u32) -> Connection {
        let conn = cursus_db::open_memory().expect("open");
        courses::upsert(
            &conn,
            &Course {
                id: "c1".into(),
                title: "Course".into(),
                is_published: true,
                status: CourseStatus::Open,
                lesson_count: lessons,
                content_revision: 1,
            },
        )
        .expect("course");
        for i in 1..=lessons {
            courses::upsert_lesson(
                &conn,
                &Lesson {
                    id: format!("l{i}"),
                    course_id: "c1".into(),
                    module_id: "m1".into(),
                    title: format!("Lesson {i}"),
                    position: i,
                    is_published: true,
                },
            )
            .expect("lesson");
        }
        let mut e = Enrollment::new("u1", "c1", lessons, 1, NOW - 100);
        e.status = EnrollmentStatus::Active;
        e.payment_status = PaymentStatus::Paid;
        e.approval_status = ApprovalStatus::Approved;
        enrollments::insert(&conn, &e).expect("enrollment");
        conn
    }

    fn lesson(id: &str) -> LessonRef<'_> {
        LessonRef {
            course_id: "c1",
            module_id: "m1",
            lesson_id: id,
        }
    }

    fn record(conn: &mut Connection, id: &str, obs: ProgressObservation, now: u64) -> Result<ProgressOutcome> {
        record_progress(conn, RetryPolicy::default(), "u1", lesson(id), &obs, now)
    }

    #[test]
    fn test_completion_recorded_once() {
        let mut conn = setup(4);
        let first = record(&mut conn, "l1", ProgressObservation::completed(), NOW).expect("first");
        assert!(first.newly_completed);
        assert_eq!(first.aggregate.percent, 25);

        let second = record(&mut conn, "l1", ProgressObservation::completed(), NOW + 5).expect("second");
        assert!(!second.newly_completed);
        assert_eq!(second.progress.completed_at, Some(NOW));

        let e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        assert_eq!(e.progress.completed_lesson_count, 1);
        assert_eq!(e.last_accessed_at, Some(NOW + 5));
    }

    #[test]
    fn test_watermark_persisted() {
        let mut conn = setup(2);
        record(&mut conn, "l1", ProgressObservation::watching(50), NOW).expect("50");
        record(&mut conn, "l1", ProgressObservation::watching(30), NOW + 1).expect("30");
        let stored = progress::find(&conn, "u1", "c1", "l1").expect("find").expect("row");
        assert_eq!(stored.max_watched_second, 50);
        assert_eq!(stored.status, LessonStatus::InProgress);

        record(&mut conn, "l1", ProgressObservation::watching(100), NOW + 2).expect("100");
        let stored = progress::find(&conn, "u1", "c1", "l1").expect("find").expect("row");
        assert_eq!(stored.max_watched_second, 100);
    }

    #[test]
    fn test_foreign_lesson_is_invalid_context() {
        let mut conn = setup(2);
        let bad = LessonRef {
            course_id: "c1",
            module_id: "m9",
            lesson_id: "l1",
        };
        let result = record_progress(
            &mut conn,
            RetryPolicy::default(),
            "u1",
            bad,
            &ProgressObservation::completed(),
            NOW,
        );
        assert!(matches!(result, Err(ProgressError::InvalidContext { .. })));
        assert!(progress::find(&conn, "u1", "c1", "l1").expect("find").is_none());
    }

    #[test]
    fn test_unpublished_lesson_is_invalid_context() {
        let mut conn = setup(2);
        courses::upsert_lesson(
            &conn,
            &Lesson {
                id: "draft".into(),
                course_id: "c1".into(),
                module_id: "m1".into(),
                title: "Draft".into(),
                position: 3,
                is_published: false,
            },
        )
        .expect("draft lesson");

        let result = record(&mut conn, "draft", ProgressObservation::completed(), NOW);
        assert!(matches!(result, Err(ProgressError::InvalidContext { .. })));
        assert!(progress::find(&conn, "u1", "c1", "draft").expect("find").is_none());

        let cached = enrollments::get(&conn, "u1", "c1").expect("enrollment").progress;
        assert_eq!(cached, crate::reconcile::derive_aggregate(&conn, "u1", "c1").expect("derive"));
        assert_eq!(cached.completed_lesson_count, 0);
    }

    #[test]
    fn test_gate_denial_surfaces_as_access_error() {
        let mut conn = setup(2);
        let result = record_progress(
            &mut conn,
            RetryPolicy::default(),
            "stranger",
            lesson("l1"),
            &ProgressObservation::completed(),
            NOW,
        );
        assert!(matches!(
            result,
            Err(ProgressError::Access(AccessError::AccessDenied { .. }))
        ));
    }

    #[test]
    fn test_completed_enrollment_is_inactive_for_writes() {
        let mut conn = setup(2);
        let mut e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        e.status = EnrollmentStatus::Completed;
        enrollments::update(&conn, &e).expect("update");

        let result = record(&mut conn, "l1", ProgressObservation::completed(), NOW);
        assert!(matches!(
            result,
            Err(ProgressError::EnrollmentInactive {
                status: Some(EnrollmentStatus::Completed)
            })
        ));
        let e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        assert_eq!(e.progress.completed_lesson_count, 0);
    }

    #[test]
    fn test_all_lessons_reach_hundred_percent() {
        let mut conn = setup(3);
        for id in ["l1", "l2", "l3"] {
            record(&mut conn, id, ProgressObservation::completed(), NOW).expect("complete");
        }
        let e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        assert_eq!(e.progress, ProgressAggregate::new(3, 3));
        assert!(e.progress.is_complete());
    }
}
