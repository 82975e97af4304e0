//! # cursus-certificate
//!
//! Completion certificates: issued at most once per `(user, course)`,
//! publicly verifiable by code, revocable by administrators.
//!
//! ## Modules
//!
//! - [`eligibility`]: Whether an enrollment has earned its certificate
//! - [`issuer`]: Idempotent issuance under concurrent requests
//! - [`registry`]: Public verification, listing and revocation

pub mod eligibility;
pub mod issuer;
pub mod registry;

use cursus_access::AccessError;
use cursus_db::{DbError, Retryable};

/// Error types for certificate operations.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// The user failed the access gate for the course.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The course is not finished yet.
    #[error("course not complete: {completed} of {required} lessons ({percent}%)")]
    NotComplete {
        /// Completed lessons that count towards the certificate.
        completed: u32,
        /// Lessons required.
        required: u32,
        /// Completion percentage.
        percent: u8,
    },

    /// No certificate carries this code.
    #[error("certificate not found: {0}")]
    NotFound(String),

    /// The caller may not act on this user's certificates.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// Every generated code collided with an existing one.
    #[error("could not allocate a unique code after {attempts} attempts")]
    CodeSpaceExhausted {
        /// Codes tried.
        attempts: u32,
    },

    /// Store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Retryable for CertificateError {
    fn is_conflict(&self) -> bool {
        match self {
            CertificateError::Db(e) => e.is_conflict(),
            CertificateError::Access(e) => e.is_conflict(),
            _ => false,
        }
    }
}

/// Convenience result type for certificate operations.
pub type Result<T> = std::result::Result<T, CertificateError>;
