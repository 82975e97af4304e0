//! Completion certificates.

use serde::{Deserialize, Serialize};

use crate::{CourseId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Issued,
    Revoked,
}

crate::status_enum!(CertificateStatus, "certificate status", {
    Issued => "issued",
    Revoked => "revoked",
});

/// A stored certificate. At most one exists per `(user_id, course_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Deterministic id derived from `(user_id, course_id)`.
    pub id: String,
    /// Public verification code, globally unique.
    pub code: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub issued_at: u64,
    /// Course content revision the completion was measured against.
    pub course_revision: u32,
    /// Number of lessons required at issuance.
    pub lessons_considered: u32,
    /// Hex BLAKE3 digest binding the issuance facts together.
    pub integrity_hash: String,
    /// `"system"` for self-issuance, otherwise the issuing admin's user id.
    pub issued_by: String,
    pub status: CertificateStatus,
}

/// Result of an `issue_certificate` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct IssuedCertificate {
    pub certificate_id: String,
    pub code: String,
    pub issued_at: u64,
    /// True when an earlier call had already issued this certificate.
    pub already_issued: bool,
}

impl IssuedCertificate {
    pub fn from_certificate(cert: &Certificate, already_issued: bool) -> Self {
        Self {
            certificate_id: cert.id.clone(),
            code: cert.code.clone(),
            issued_at: cert.issued_at,
            already_issued,
        }
    }
}

/// Public, unauthenticated verification result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct CertificateVerification {
    pub valid: bool,
    pub code: String,
    pub course_id: Option<CourseId>,
    pub issued_at: Option<u64>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_view_copies_identity() {
        let cert = Certificate {
            id: "abc".into(),
            code: "CRS-26-ABCD-EFGH-JKLM".into(),
            user_id: "u1".into(),
            course_id: "c1".into(),
            issued_at: 42,
            course_revision: 2,
            lessons_considered: 10,
            integrity_hash: "00".into(),
            issued_by: "system".into(),
            status: CertificateStatus::Issued,
        };
        let view = IssuedCertificate::from_certificate(&cert, true);
        assert_eq!(view.certificate_id, "abc");
        assert_eq!(view.code, cert.code);
        assert!(view.already_issued);
    }
}
