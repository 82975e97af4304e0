//! # cursus-types
//!
//! Shared domain types used across the Cursus workspace: courses, enrollments,
//! lesson progress, certificates, payment signals and the events the ledger
//! emits.
//!
//! Every status field is an exhaustive enum. The string forms produced by
//! [`as_str`](enrollment::EnrollmentStatus::as_str) are the values persisted by
//! `cursus-db` and exchanged over JSON-RPC; parsing them back goes through
//! [`std::str::FromStr`] so unknown values are rejected at the store boundary.

/// Identifier of a platform user, as carried by a verified session.
pub type UserId = String;
/// Identifier of a course document.
pub type CourseId = String;
/// Identifier of a module within a course.
pub type ModuleId = String;
/// Identifier of a lesson within a module.
pub type LessonId = String;

/// Percentage value reported for fully completed courses and lessons.
pub const PERCENT_COMPLETE: u8 = 100;

/// A persisted or wire string did not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseStatusError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a fieldless status enum.
macro_rules! status_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Canonical snake_case form, as stored and serialized.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::ParseStatusError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use status_enum;

pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod events;
pub mod identity;
pub mod progress;
pub mod signal;

#[cfg(test)]
mod tests {
    use crate::enrollment::{EnrollmentStatus, SubscriptionStatus};

    #[test]
    fn test_status_string_forms_match_serde() {
        for status in SubscriptionStatus::ALL {
            let json = serde_json::to_string(status).expect("serialize");
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "frozen".parse::<EnrollmentStatus>().expect_err("must reject");
        assert_eq!(err.kind, "enrollment status");
        assert_eq!(err.value, "frozen");
    }

    #[test]
    #[ignore] // Run manually to generate bindings
    fn export_ts_bindings() {
        use ts_rs::TS;
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bindings");
        std::fs::create_dir_all(&dir).expect("create bindings dir");
        crate::enrollment::AccessView::export_all_to(&dir).expect("export");
        crate::progress::ProgressObservation::export_all_to(&dir).expect("export");
        crate::certificate::IssuedCertificate::export_all_to(&dir).expect("export");
        crate::certificate::CertificateVerification::export_all_to(&dir).expect("export");
    }
}
