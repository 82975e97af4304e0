//! Content authorization.
//!
//! Every lesson read, progress write and certificate request passes through
//! [`assert_can_access_course`]. The gate checks the stored enrollment status
//! and the subscription window; the access policy decides how an enrollment
//! gets into `active` in the first place.

use rusqlite::Connection;

use cursus_db::queries::{courses, enrollments};
use cursus_types::course::{Course, CourseStatus};
use cursus_types::enrollment::{AccessStatus, AccessView, Enrollment, EnrollmentStatus};
use cursus_types::identity::VerifiedIdentity;

use crate::{policy, AccessError, DenialReason, Result};

/// A successful authorization.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub course: Course,
    /// Absent only for admin previews.
    pub enrollment: Option<Enrollment>,
    /// True when access was granted by role rather than by enrollment.
    pub admin_override: bool,
}

/// Authorize `user_id` to consume `course_id` at `now`.
///
/// # Errors
///
/// - [`AccessError::CourseUnavailable`] if the course is missing, unpublished or archived
/// - [`AccessError::AccessDenied`] if the enrollment is missing, not active or
///   completed, or its paid period has ended
pub fn assert_can_access_course(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<AccessGrant> {
    let course = load_course(conn, course_id)?;
    if course.is_globally_blocked() {
        return Err(unavailable(course_id));
    }

    let enrollment = enrollments::find(conn, user_id, course_id)?;
    check_enrollment(course_id, enrollment.as_ref(), now)?;

    Ok(AccessGrant {
        course,
        enrollment,
        admin_override: false,
    })
}

/// Authorize a verified caller. Administrators may preview unpublished,
/// draft and closed courses without an enrollment; archived courses stay
/// closed to everyone.
pub fn authorize(
    conn: &Connection,
    identity: &VerifiedIdentity,
    course_id: &str,
    now: u64,
) -> Result<AccessGrant> {
    if !identity.is_admin() {
        return assert_can_access_course(conn, &identity.user_id, course_id, now);
    }

    let course = load_course(conn, course_id)?;
    if course.status == CourseStatus::Archived {
        return Err(unavailable(course_id));
    }
    let enrollment = enrollments::find(conn, &identity.user_id, course_id)?;
    tracing::debug!(user_id = %identity.user_id, course_id, "admin override");
    Ok(AccessGrant {
        course,
        enrollment,
        admin_override: true,
    })
}

/// Current access status of `user_id` for `course_id`, as shown to the UI.
pub fn access_view(conn: &Connection, user_id: &str, course_id: &str, now: u64) -> Result<AccessView> {
    let course = load_course(conn, course_id)?;
    let enrollment = enrollments::find(conn, user_id, course_id)?;

    let access_status = enrollment
        .as_ref()
        .map_or(AccessStatus::AwaitingPayment, policy::access_status_of);

    let denial = if course.is_globally_blocked() {
        Some("course unavailable".to_string())
    } else {
        check_enrollment(course_id, enrollment.as_ref(), now)
            .err()
            .map(|e| match e {
                AccessError::AccessDenied { reason, .. } => reason.to_string(),
                other => other.to_string(),
            })
    };

    Ok(AccessView {
        course_id: course_id.to_string(),
        access_status,
        enrollment_status: enrollment.as_ref().map(|e| e.status),
        can_consume: denial.is_none(),
        progress: enrollment.as_ref().map(|e| e.progress),
        reason: denial,
    })
}

fn check_enrollment(course_id: &str, enrollment: Option<&Enrollment>, now: u64) -> Result<()> {
    let deny = |reason| AccessError::AccessDenied {
        course_id: course_id.to_string(),
        reason,
    };
    let Some(enrollment) = enrollment else {
        return Err(deny(DenialReason::NotEnrolled));
    };
    match enrollment.status {
        EnrollmentStatus::Active | EnrollmentStatus::Completed => {}
        EnrollmentStatus::Pending => return Err(deny(DenialReason::Pending)),
        EnrollmentStatus::Expired => return Err(deny(DenialReason::Expired)),
        status => return Err(deny(DenialReason::Inactive { status })),
    }
    if enrollment.access_window_elapsed(now) {
        return Err(deny(DenialReason::Expired));
    }
    Ok(())
}

fn load_course(conn: &Connection, course_id: &str) -> Result<Course> {
    courses::find(conn, course_id)?.ok_or_else(|| unavailable(course_id))
}

fn unavailable(course_id: &str) -> AccessError {
    AccessError::CourseUnavailable {
        course_id: course_id.to_string(),
    }
}
