//! Public verification, listing and revocation.

use rusqlite::Connection;

use cursus_crypto::codes::normalize_code;
use cursus_db::queries::audit::{self, AuditEntry};
use cursus_db::queries::certificates;
use cursus_db::{transact, RetryPolicy};
use cursus_types::certificate::{Certificate, CertificateStatus, CertificateVerification};
use cursus_types::identity::VerifiedIdentity;

use crate::{CertificateError, Result};

/// Look up a certificate by code. Unauthenticated and read-only; does not
/// reveal who holds the certificate.
pub fn verify_certificate(conn: &Connection, code: &str) -> Result<CertificateVerification> {
    let code = normalize_code(code);
    let Some(cert) = certificates::find_by_code(conn, &code)? else {
        return Ok(CertificateVerification {
            valid: false,
            code,
            course_id: None,
            issued_at: None,
            message: "certificate not found".into(),
        });
    };

    let (valid, message) = match cert.status {
        CertificateStatus::Issued => (true, "certificate is valid"),
        CertificateStatus::Revoked => (false, "certificate has been revoked"),
    };
    Ok(CertificateVerification {
        valid,
        code,
        course_id: Some(cert.course_id),
        issued_at: Some(cert.issued_at),
        message: message.into(),
    })
}

/// Certificates held by `user_id`, newest first.
pub fn list_certificates(
    conn: &Connection,
    caller: &VerifiedIdentity,
    user_id: &str,
) -> Result<Vec<Certificate>> {
    if !caller.may_act_for(user_id) {
        return Err(CertificateError::NotPermitted(
            "only administrators may list another user's certificates".into(),
        ));
    }
    Ok(certificates::list_for_user(conn, user_id)?)
}

/// Revoke a certificate. The enrollment keeps its completed status.
///
/// # Errors
///
/// - [`CertificateError::NotPermitted`] unless `admin` has the admin role
/// - [`CertificateError::NotFound`] for an unknown code
pub fn revoke_certificate(
    conn: &mut Connection,
    retry: RetryPolicy,
    admin: &VerifiedIdentity,
    code: &str,
    reason: Option<&str>,
    now: u64,
) -> Result<Certificate> {
    if !admin.is_admin() {
        return Err(CertificateError::NotPermitted("admin role required".into()));
    }
    let code = normalize_code(code);

    let revoked = transact(conn, retry, |tx| -> Result<Certificate> {
        let mut cert = certificates::find_by_code(tx, &code)?
            .ok_or_else(|| CertificateError::NotFound(code.clone()))?;
        if certificates::set_status(tx, &code, CertificateStatus::Revoked)? {
            audit::record(
                tx,
                &AuditEntry {
                    actor: &admin.user_id,
                    action: "certificate_revoked",
                    user_id: &cert.user_id,
                    course_id: &cert.course_id,
                    detail: serde_json::json!({ "code": code, "reason": reason }),
                    created_at: now,
                },
            )?;
        }
        cert.status = CertificateStatus::Revoked;
        Ok(cert)
    })?;

    tracing::info!(code = %revoked.code, admin = %admin.user_id, "certificate revoked");
    Ok(revoked)
}
