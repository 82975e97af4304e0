//! Idempotent certificate issuance.
//!
//! The certificate id is derived from `(user_id, course_id)`, and the store
//! enforces uniqueness on the id, the pair and the code. Issuance runs in an
//! immediate transaction: a request that finds a certificate already stored
//! returns it unchanged, and an insert that is ignored because a concurrent
//! request got there first is redirected to the stored winner. Only a code
//! collision with a different pair triggers a fresh code.

use rusqlite::Connection;

use cursus_access::gate;
use cursus_crypto::codes::{self, IntegrityInput};
use cursus_db::queries::audit::{self, AuditEntry, SYSTEM_ACTOR};
use cursus_db::queries::{certificates, courses, enrollments};
use cursus_db::{transact, RetryPolicy};
use cursus_types::certificate::{Certificate, CertificateStatus, IssuedCertificate};
use cursus_types::enrollment::EnrollmentStatus;
use cursus_types::identity::VerifiedIdentity;

use crate::{eligibility, CertificateError, Result};

/// Issuance settings.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Leading part of every verification code, e.g. `CRS`.
    pub code_prefix: String,
    pub retry: RetryPolicy,
    /// Fresh codes to try when a generated code is already taken.
    pub max_code_attempts: u32,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            code_prefix: "CRS".to_string(),
            retry: RetryPolicy::default(),
            max_code_attempts: 5,
        }
    }
}

/// The certificate a call resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub certificate: Certificate,
    /// True when the certificate existed before this call.
    pub already_issued: bool,
}

impl Issuance {
    pub fn view(&self) -> IssuedCertificate {
        IssuedCertificate::from_certificate(&self.certificate, self.already_issued)
    }
}

/// Issue the certificate for `user_id` in `course_id`, or return the one
/// already issued.
///
/// `caller` must be the user or an administrator issuing on their behalf.
///
/// # Errors
///
/// - [`CertificateError::NotPermitted`] if the caller acts for someone else without the admin role
/// - [`CertificateError::Access`] if the user fails the access gate
/// - [`CertificateError::NotComplete`] if the course is not finished
/// - [`CertificateError::CodeSpaceExhausted`] if no unique code could be generated
pub fn issue_certificate(
    conn: &mut Connection,
    config: &IssuerConfig,
    caller: &VerifiedIdentity,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<Issuance> {
    if !caller.may_act_for(user_id) {
        return Err(CertificateError::NotPermitted(
            "only administrators may issue for another user".into(),
        ));
    }

    gate::assert_can_access_course(conn, user_id, course_id, now)?;

    if let Some(existing) = certificates::find_by_pair(conn, user_id, course_id)? {
        return Ok(Issuance {
            certificate: existing,
            already_issued: true,
        });
    }

    let issued_by = if caller.user_id == user_id {
        SYSTEM_ACTOR
    } else {
        caller.user_id.as_str()
    };

    let issuance = transact(conn, config.retry, |tx| -> Result<Issuance> {
        if let Some(existing) = certificates::find_by_pair(tx, user_id, course_id)? {
            return Ok(Issuance {
                certificate: existing,
                already_issued: true,
            });
        }

        let mut enrollment = enrollments::get(tx, user_id, course_id)?;
        let eligible = eligibility::check(tx, &enrollment)?;
        let course = courses::get(tx, course_id)?;
        // The revision the learner enrolled under wins over the live one.
        let course_revision = [enrollment.course_revision, course.content_revision]
            .into_iter()
            .find(|&r| r > 0)
            .unwrap_or(1);

        let integrity_hash = codes::integrity_hash(&IntegrityInput {
            user_id,
            course_id,
            course_revision,
            lesson_ids: &eligible.lesson_ids,
            issued_at: now,
        });

        let mut stored = None;
        for attempt in 1..=config.max_code_attempts {
            let candidate = Certificate {
                id: codes::certificate_id(user_id, course_id),
                code: codes::generate_code(&config.code_prefix),
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                issued_at: now,
                course_revision,
                lessons_considered: eligible.lessons_considered(),
                integrity_hash: integrity_hash.clone(),
                issued_by: issued_by.to_string(),
                status: CertificateStatus::Issued,
            };
            if certificates::insert_if_absent(tx, &candidate)? {
                stored = Some(candidate);
                break;
            }
            if let Some(winner) = certificates::find_by_pair(tx, user_id, course_id)? {
                return Ok(Issuance {
                    certificate: winner,
                    already_issued: true,
                });
            }
            tracing::warn!(attempt, "certificate code collision, regenerating");
        }
        let certificate = stored.ok_or(CertificateError::CodeSpaceExhausted {
            attempts: config.max_code_attempts,
        })?;

        enrollment.status = EnrollmentStatus::Completed;
        enrollment.progress = eligible.aggregate;
        enrollment.completed_at.get_or_insert(now);
        enrollment.updated_at = now;
        enrollments::update(tx, &enrollment)?;

        audit::record(
            tx,
            &AuditEntry {
                actor: issued_by,
                action: "certificate_issued",
                user_id,
                course_id,
                detail: serde_json::json!({
                    "certificate_id": certificate.id,
                    "code": certificate.code,
                    "course_revision": certificate.course_revision,
                }),
                created_at: now,
            },
        )?;

        Ok(Issuance {
            certificate,
            already_issued: false,
        })
    })?;

    if !issuance.already_issued {
        tracing::info!(
            user_id,
            course_id,
            certificate_id = %issuance.certificate.id,
            issued_by,
            "certificate issued"
        );
    }
    Ok(issuance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{setup, NOW};
    use cursus_access::AccessError;
    use cursus_types::enrollment::ProgressAggregate;

    fn issue(conn: &mut Connection, caller: &VerifiedIdentity, user: &str) -> Result<Issuance> {
        issue_certificate(conn, &IssuerConfig::default(), caller, user, "c1", NOW)
    }

    #[test]
    fn test_issue_at_full_completion() {
        let mut conn = setup(100, 100);
        let issuance = issue(&mut conn, &VerifiedIdentity::student("u1"), "u1").expect("issue");
        assert!(!issuance.already_issued);

        let cert = &issuance.certificate;
        assert_eq!(cert.id, codes::certificate_id("u1", "c1"));
        assert!(cert.code.starts_with("CRS-"));
        assert_eq!(cert.lessons_considered, 100);
        assert_eq!(cert.course_revision, 3);
        assert_eq!(cert.issued_by, SYSTEM_ACTOR);

        let e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        assert_eq!(e.status, EnrollmentStatus::Completed);
        assert_eq!(e.progress, ProgressAggregate::new(100, 100));
        assert_eq!(e.completed_at, Some(NOW));
    }


    #[test]
    fn test_revision_at_enrollment_preferred() {
        let mut conn = setup(2, 2);
        let mut e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        e.course_revision = 2;
        enrollments::update(&conn, &e).expect("update");
        let cert = issue(&mut conn, &VerifiedIdentity::student("u1"), "u1")
            .expect("issue")
            .certificate;
        assert_eq!(cert.course_revision, 2);
    }

    #[test]
    fn test_unknown_enrollment_revision_falls_back_to_course() {
        let mut conn = setup(2, 2);
        let mut e = enrollments::get(&conn, "u1", "c1").expect("enrollment");
        e.course_revision = 0;
        enrollments::update(&conn, &e).expect("update");
        let cert = issue(&mut conn, &VerifiedIdentity::student("u1"), "u1")
            .expect("issue")
            .certificate;
        assert_eq!(cert.course_revision, 3);
    }
    #[test]
    fn test_issue_fails_one_lesson_short() {
        let mut conn = setup(100, 99);
        let err = issue(&mut conn, &VerifiedIdentity::student("u1"), "u1").expect_err("incomplete");
        assert!(matches!(
            err,
            CertificateError::NotComplete {
                completed: 99,
                required: 100,
                percent: 99
            }
        ));
        assert!(err.to_string().contains("99%"));
        assert!(certificates::find_by_pair(&conn, "u1", "c1").expect("find").is_none());
    }

    #[test]
    fn test_repeat_calls_return_same_certificate() {
        let mut conn = setup(2, 2);
        let student = VerifiedIdentity::student("u1");
        let first = issue(&mut conn, &student, "u1").expect("first");
        let second = issue(&mut conn, &student, "u1").expect("second");
        assert!(second.already_issued);
        assert_eq!(first.certificate, second.certificate);
        assert_eq!(certificates::list_for_user(&conn, "u1").expect("list").len(), 1);
    }

    #[test]
    fn test_admin_issues_on_behalf() {
        let mut conn = setup(2, 2);
        let issuance = issue(&mut conn, &VerifiedIdentity::admin("ops"), "u1").expect("issue");
        assert_eq!(issuance.certificate.user_id, "u1");
        assert_eq!(issuance.certificate.issued_by, "ops");
    }

    #[test]
    fn test_student_cannot_issue_for_others() {
        let mut conn = setup(2, 2);
        assert!(matches!(
            issue(&mut conn, &VerifiedIdentity::student("u2"), "u1"),
            Err(CertificateError::NotPermitted(_))
        ));
    }

    #[test]
    fn test_gate_applies() {
        let mut conn = setup(2, 2);
        assert!(matches!(
            issue(&mut conn, &VerifiedIdentity::student("u9"), "u9"),
            Err(CertificateError::Access(AccessError::AccessDenied { .. }))
        ));
    }

    #[test]
    fn test_issuance_is_audited() {
        let mut conn = setup(1, 1);
        issue(&mut conn, &VerifiedIdentity::student("u1"), "u1").expect("issue");
        let rows = audit::list_for_pair(&conn, "u1", "c1").expect("audit");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "certificate_issued");
    }
}
