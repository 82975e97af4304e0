//! Pure progress planning.
//!
//! [`plan_progress`] takes the records read inside the transaction and the
//! incoming observation and returns the records to write back. It performs
//! no I/O, so every monotonicity rule is testable without a database.

use cursus_types::enrollment::{Enrollment, EnrollmentStatus, ProgressAggregate};
use cursus_types::progress::{LessonProgress, LessonStatus, ProgressObservation};
use cursus_types::PERCENT_COMPLETE;

use crate::{ProgressError, Result};

/// The lesson an observation refers to, already validated against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct LessonRef<'a> {
    pub course_id: &'a str,
    pub module_id: &'a str,
    pub lesson_id: &'a str,
}

/// Records to write for one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressDelta {
    pub progress: LessonProgress,
    pub enrollment: Enrollment,
    /// True only for the observation that first completed the lesson.
    pub newly_completed: bool,
}

/// Compute the next lesson record and enrollment aggregate.
///
/// `course_lesson_count` is used only when the enrollment's cached
/// `total_lessons` is zero.
///
/// # Errors
///
/// - [`ProgressError::EnrollmentInactive`] unless the enrollment is `active`
pub fn plan_progress(
    user_id: &str,
    lesson: LessonRef<'_>,
    existing: Option<&LessonProgress>,
    enrollment: &Enrollment,
    observed: &ProgressObservation,
    course_lesson_count: u32,
    now: u64,
) -> Result<ProgressDelta> {
    if enrollment.status != EnrollmentStatus::Active {
        return Err(ProgressError::EnrollmentInactive {
            status: Some(enrollment.status),
        });
    }

    let was_completed = existing.is_some_and(LessonProgress::is_completed);
    let completed = was_completed || observed.status == LessonStatus::Completed;
    let newly_completed = completed && !was_completed;

    let previous_max = existing.map_or(0, |p| p.max_watched_second);
    let max_watched_second = previous_max.max(observed.max_watched_second.unwrap_or(0));

    let percent = if completed {
        PERCENT_COMPLETE
    } else {
        let previous = existing.map_or(0, |p| p.percent);
        previous.max(observed.percent.unwrap_or(0).min(PERCENT_COMPLETE))
    };

    let completed_at = match existing.and_then(|p| p.completed_at) {
        Some(at) if was_completed => Some(at),
        _ if newly_completed => Some(now),
        _ => None,
    };

    let progress = LessonProgress {
        user_id: user_id.to_string(),
        course_id: lesson.course_id.to_string(),
        module_id: lesson.module_id.to_string(),
        lesson_id: lesson.lesson_id.to_string(),
        status: if completed {
            LessonStatus::Completed
        } else {
            observed.status
        },
        percent,
        max_watched_second,
        completed_at,
        updated_at: now,
    };

    let mut next = enrollment.clone();
    next.last_accessed_at = Some(now);
    next.updated_at = now;
    if newly_completed {
        let total = match next.progress.total_lessons {
            0 => course_lesson_count,
            cached => cached,
        };
        next.progress =
            ProgressAggregate::new(next.progress.completed_lesson_count.saturating_add(1), total);
    }

    Ok(ProgressDelta {
        progress,
        enrollment: next,
        newly_completed,
    })
}
