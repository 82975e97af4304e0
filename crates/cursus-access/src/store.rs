//! Enrollment writes shared by the payment-signal and admin paths.
//!
//! Callers mutate the signal fields of an enrollment and hand it to
//! [`settle`], which derives the stored status from the access policy,
//! persists the record and audits any status transition, all inside the
//! caller's transaction.

use rusqlite::Connection;

use cursus_db::queries::audit::{self, AuditEntry};
use cursus_db::queries::{courses, enrollments, progress};
use cursus_types::enrollment::{Enrollment, EnrollmentStatus};

use crate::{policy, AccessError, Result};

/// Result of a write to an enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentChange {
    /// The enrollment as stored after the write.
    pub enrollment: Enrollment,
    /// Status before the write; `None` when the enrollment was created.
    pub previous_status: Option<EnrollmentStatus>,
}

impl EnrollmentChange {
    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.enrollment.status)
    }
}

/// An enrollment loaded for modification.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub enrollment: Enrollment,
    pub is_new: bool,
}

/// Load the enrollment for a pair, creating a pending one if `create` is set.
///
/// A created enrollment starts from the aggregate its pair's lesson records imply.
///
/// # Errors
///
/// - [`AccessError::CourseUnavailable`] if a new enrollment names an unknown course
/// - [`AccessError::EnrollmentNotFound`] if absent and `create` is false
pub fn load(conn: &Connection, user_id: &str, course_id: &str, create: bool, now: u64) -> Result<Loaded> {
    if let Some(enrollment) = enrollments::find(conn, user_id, course_id)? {
        return Ok(Loaded {
            enrollment,
            is_new: false,
        });
    }
    if !create {
        return Err(AccessError::EnrollmentNotFound {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
        });
    }
    let course = courses::find(conn, course_id)?.ok_or_else(|| AccessError::CourseUnavailable {
        course_id: course_id.to_string(),
    })?;
    // Lesson records outlive a revoked enrollment; a regrant resumes from them.
    let mut enrollment = Enrollment::new(
        user_id,
        course_id,
        course.lesson_count,
        course.content_revision,
        now,
    );
    enrollment.progress = progress::derive_aggregate(conn, user_id, course_id)?;
    Ok(Loaded {
        enrollment,
        is_new: true,
    })
}

/// Derive the status from the signals, persist, and audit a transition.
pub fn settle(
    conn: &Connection,
    loaded: Loaded,
    actor: &str,
    cause: &str,
    now: u64,
) -> Result<EnrollmentChange> {
    let Loaded {
        mut enrollment,
        is_new,
    } = loaded;
    let previous_status = (!is_new).then_some(enrollment.status);

    let access = policy::access_status_of(&enrollment);
    enrollment.status = policy::enrollment_status_for(access, enrollment.status);
    enrollment.updated_at = now;

    if is_new {
        enrollments::insert(conn, &enrollment)?;
    } else {
        enrollments::update(conn, &enrollment)?;
    }

    let change = EnrollmentChange {
        enrollment,
        previous_status,
    };
    if change.status_changed() {
        audit::record(
            conn,
            &AuditEntry {
                actor,
                action: "enrollment_status_changed",
                user_id: &change.enrollment.user_id,
                course_id: &change.enrollment.course_id,
                detail: serde_json::json!({
                    "from": previous_status.map(|s| s.as_str()),
                    "to": change.enrollment.status.as_str(),
                    "access_status": access.as_str(),
                    "cause": cause,
                }),
                created_at: now,
            },
        )?;
        tracing::info!(
            user_id = %change.enrollment.user_id,
            course_id = %change.enrollment.course_id,
            from = ?previous_status,
            to = %change.enrollment.status,
            cause,
            "enrollment status changed"
        );
    }
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{db_with_course, NOW};
    use cursus_types::course::CourseStatus;
    use cursus_types::enrollment::{ApprovalStatus, PaymentStatus};

    #[test]
    fn test_create_settles_to_pending_and_audits() {
        let conn = db_with_course(CourseStatus::Open, true);
        let loaded = load(&conn, "u1", "c1", true, NOW).expect("load");
        assert!(loaded.is_new);
        assert_eq!(loaded.enrollment.progress.total_lessons, 10);

        let change = settle(&conn, loaded, "system", "checkout_started", NOW).expect("settle");
        assert_eq!(change.enrollment.status, EnrollmentStatus::Pending);
        assert!(change.status_changed());

        let rows = audit::list_for_pair(&conn, "u1", "c1").expect("audit");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].detail["from"], serde_json::Value::Null);
        assert_eq!(rows[0].detail["to"], "pending");
    }

    #[test]
    fn test_unchanged_status_not_audited() {
        let conn = db_with_course(CourseStatus::Open, true);
        let loaded = load(&conn, "u1", "c1", true, NOW).expect("load");
        settle(&conn, loaded, "system", "first", NOW).expect("first");

        let loaded = load(&conn, "u1", "c1", false, NOW + 1).expect("reload");
        let change = settle(&conn, loaded, "system", "second", NOW + 1).expect("second");
        assert!(!change.status_changed());
        assert_eq!(audit::list_for_pair(&conn, "u1", "c1").expect("audit").len(), 1);
    }

    #[test]
    fn test_paid_and_approved_becomes_active() {
        let conn = db_with_course(CourseStatus::Open, true);
        let mut loaded = load(&conn, "u1", "c1", true, NOW).expect("load");
        loaded.enrollment.payment_status = PaymentStatus::Paid;
        loaded.enrollment.approval_status = ApprovalStatus::Approved;
        let change = settle(&conn, loaded, "admin", "grant", NOW).expect("settle");
        assert_eq!(change.enrollment.status, EnrollmentStatus::Active);
        assert_eq!(
            enrollments::get(&conn, "u1", "c1").expect("stored").status,
            EnrollmentStatus::Active
        );
    }

    #[test]
    fn test_missing_without_create() {
        let conn = db_with_course(CourseStatus::Open, true);
        assert!(matches!(
            load(&conn, "u1", "c1", false, NOW),
            Err(AccessError::EnrollmentNotFound { .. })
        ));
        assert!(matches!(
            load(&conn, "u1", "ghost", true, NOW),
            Err(AccessError::CourseUnavailable { .. })
        ));
    }
}
