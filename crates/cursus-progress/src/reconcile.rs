//! Aggregate reconciliation.
//!
//! The enrollment aggregate caches `total_lessons` from the time of
//! enrollment. When the curriculum changes afterwards the cache drifts;
//! reconciling recounts completed published lessons against the live
//! published-lesson count and rewrites the aggregate.

use rusqlite::Connection;

use cursus_db::queries::{enrollments, progress};
use cursus_db::{transact, RetryPolicy};
use cursus_types::enrollment::ProgressAggregate;

use crate::Result;

/// Aggregate derived from lesson records and the live catalog.
pub fn derive_aggregate(conn: &Connection, user_id: &str, course_id: &str) -> Result<ProgressAggregate> {
    Ok(progress::derive_aggregate(conn, user_id, course_id)?)
}

/// Rewrite the enrollment's cached aggregate from its lesson records.
///
/// Returns the reconciled aggregate and whether it differed from the cache.
pub fn reconcile_aggregate(
    conn: &mut Connection,
    retry: RetryPolicy,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<(ProgressAggregate, bool)> {
    transact(conn, retry, |tx| -> Result<(ProgressAggregate, bool)> {
        let mut enrollment = enrollments::get(tx, user_id, course_id)?;
        let derived = derive_aggregate(tx, user_id, course_id)?;
        if derived == enrollment.progress {
            return Ok((derived, false));
        }
        tracing::info!(
            user_id,
            course_id,
            cached_completed = enrollment.progress.completed_lesson_count,
            cached_total = enrollment.progress.total_lessons,
            completed = derived.completed_lesson_count,
            total = derived.total_lessons,
            "reconciled progress aggregate"
        );
        enrollment.progress = derived;
        enrollment.updated_at = now;
        enrollments::update(tx, &enrollment)?;
        Ok((derived, true))
    })
}
