//! # cursus-access
//!
//! Who may consume which course, and how enrollments move between states.
//!
//! ## Modules
//!
//! - [`policy`]: Pure decision table from payment/approval/subscription to access status
//! - [`identity`]: Session-token verification
//! - [`gate`]: Read-only authorization of content reads and writes
//! - [`store`]: Enrollment persistence shared by signal and admin paths
//! - [`signals`]: Application of payment-processor signals, with replay protection
//! - [`admin`]: Manual grant, approval, rejection and revocation

pub mod admin;
pub mod gate;
pub mod identity;
pub mod policy;
pub mod signals;
pub mod store;

use cursus_db::{DbError, Retryable};
use cursus_types::enrollment::EnrollmentStatus;
use serde::Serialize;

/// Why an enrolled-content request was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    NotEnrolled,
    Pending,
    Expired,
    Inactive { status: EnrollmentStatus },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::NotEnrolled => f.write_str("not enrolled in this course"),
            DenialReason::Pending => f.write_str("enrollment is pending approval or payment"),
            DenialReason::Expired => f.write_str("access period has ended"),
            DenialReason::Inactive { status } => write!(f, "enrollment is {status}"),
        }
    }
}

/// Error types for access control.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// No session, or the session token failed verification.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The course does not exist, is unpublished, or is archived.
    #[error("course unavailable: {course_id}")]
    CourseUnavailable {
        /// The requested course.
        course_id: String,
    },

    /// The caller has no usable enrollment.
    #[error("access denied: {reason}")]
    AccessDenied {
        /// The requested course.
        course_id: String,
        /// What the enrollment lacks.
        reason: DenialReason,
    },

    /// The caller is authenticated but lacks the role for this action.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// An operation that needs an existing enrollment found none.
    #[error("no enrollment for user '{user_id}' in course '{course_id}'")]
    EnrollmentNotFound {
        /// Enrollment owner.
        user_id: String,
        /// Enrollment course.
        course_id: String,
    },

    /// A payment signal's signature did not verify.
    #[error("invalid signal signature")]
    InvalidSignature,

    /// Store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Retryable for AccessError {
    fn is_conflict(&self) -> bool {
        matches!(self, AccessError::Db(e) if e.is_conflict())
    }
}

/// Convenience result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
