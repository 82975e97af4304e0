//! # cursus-progress
//!
//! Per-lesson progress and the enrollment aggregate derived from it.
//!
//! Progress is monotonic: watch-time and percent are high-water marks, and a
//! completed lesson stays completed with its first `completed_at`. Each
//! completion increments the enrollment's completed-lesson count exactly once,
//! no matter how many requests race to report it.
//!
//! ## Modules
//!
//! - [`plan`]: Pure "snapshot in, delta out" progress planning
//! - [`tracker`]: Authorized, transactional recording of observations
//! - [`reconcile`]: Rebuilding a drifted aggregate from lesson records

pub mod plan;
pub mod reconcile;
pub mod tracker;

use cursus_access::AccessError;
use cursus_db::{DbError, Retryable};
use cursus_types::enrollment::EnrollmentStatus;

/// Error types for progress operations.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// The caller failed the access gate.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The module/lesson reference does not belong to the course.
    #[error("lesson not part of this course")]
    InvalidContext {
        course_id: String,
        module_id: String,
        lesson_id: String,
    },

    /// The enrollment stopped being active between authorization and write.
    #[error("enrollment is not active")]
    EnrollmentInactive {
        /// Status found inside the transaction; `None` if the enrollment vanished.
        status: Option<EnrollmentStatus>,
    },

    /// Store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Retryable for ProgressError {
    fn is_conflict(&self) -> bool {
        match self {
            ProgressError::Db(e) => e.is_conflict(),
            ProgressError::Access(e) => e.is_conflict(),
            _ => false,
        }
    }
}

/// Convenience result type for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;
