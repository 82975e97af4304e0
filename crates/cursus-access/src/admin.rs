//! Administrative enrollment actions.
//!
//! All actions require an admin identity, run in one transaction each and
//! leave an audit row naming the acting admin.

use rusqlite::Connection;

use cursus_db::queries::audit::{self, AuditEntry};
use cursus_db::queries::enrollments;
use cursus_db::{transact, RetryPolicy};
use cursus_types::enrollment::{ApprovalStatus, PaymentStatus, SubscriptionStatus};
use cursus_types::identity::VerifiedIdentity;

use crate::store::{self, EnrollmentChange};
use crate::{AccessError, Result};

fn require_admin(identity: &VerifiedIdentity) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AccessError::NotPermitted("admin role required".into()))
    }
}

/// Grant access manually: paid, approved, active subscription.
///
/// Creates the enrollment if the user has none.
pub fn open_enrollment(
    conn: &mut Connection,
    retry: RetryPolicy,
    admin: &VerifiedIdentity,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<EnrollmentChange> {
    require_admin(admin)?;
    transact(conn, retry, |tx| -> Result<EnrollmentChange> {
        let mut loaded = store::load(tx, user_id, course_id, true, now)?;
        let e = &mut loaded.enrollment;
        e.payment_status = PaymentStatus::Paid;
        e.approval_status = ApprovalStatus::Approved;
        e.subscription_status = SubscriptionStatus::Active;
        e.paid_at.get_or_insert(now);
        e.approved_at = Some(now);
        store::settle(tx, loaded, &admin.user_id, "manual_grant", now)
    })
}

/// Approve a pending enrollment. The resulting status still follows the
/// access policy: an unpaid enrollment stays pending.
pub fn approve_enrollment(
    conn: &mut Connection,
    retry: RetryPolicy,
    admin: &VerifiedIdentity,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<EnrollmentChange> {
    require_admin(admin)?;
    transact(conn, retry, |tx| -> Result<EnrollmentChange> {
        let mut loaded = store::load(tx, user_id, course_id, false, now)?;
        loaded.enrollment.approval_status = ApprovalStatus::Approved;
        loaded.enrollment.approved_at = Some(now);
        store::settle(tx, loaded, &admin.user_id, "approved", now)
    })
}

/// Reject an enrollment, recording the admin's reason.
pub fn reject_enrollment(
    conn: &mut Connection,
    retry: RetryPolicy,
    admin: &VerifiedIdentity,
    user_id: &str,
    course_id: &str,
    reason: &str,
    now: u64,
) -> Result<EnrollmentChange> {
    require_admin(admin)?;
    transact(conn, retry, |tx| -> Result<EnrollmentChange> {
        let mut loaded = store::load(tx, user_id, course_id, false, now)?;
        loaded.enrollment.approval_status = ApprovalStatus::Rejected;
        let change = store::settle(tx, loaded, &admin.user_id, "rejected", now)?;
        audit::record(
            tx,
            &AuditEntry {
                actor: &admin.user_id,
                action: "enrollment_rejected",
                user_id,
                course_id,
                detail: serde_json::json!({ "reason": reason }),
                created_at: now,
            },
        )?;
        Ok(change)
    })
}

/// Delete an enrollment outright. Lesson progress and certificates are kept,
/// and a later regrant resumes from the kept lesson records.
///
/// # Errors
///
/// - [`AccessError::EnrollmentNotFound`] if there is nothing to revoke
pub fn revoke_enrollment(
    conn: &mut Connection,
    retry: RetryPolicy,
    admin: &VerifiedIdentity,
    user_id: &str,
    course_id: &str,
    now: u64,
) -> Result<()> {
    require_admin(admin)?;
    transact(conn, retry, |tx| -> Result<()> {
        let Some(existing) = enrollments::find(tx, user_id, course_id)? else {
            return Err(AccessError::EnrollmentNotFound {
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
            });
        };
        enrollments::delete(tx, user_id, course_id)?;
        audit::record(
            tx,
            &AuditEntry {
                actor: &admin.user_id,
                action: "enrollment_revoked",
                user_id,
                course_id,
                detail: serde_json::json!({ "status": existing.status.as_str() }),
                created_at: now,
            },
        )?;
        Ok(())
    })?;
    tracing::info!(user_id, course_id, admin = %admin.user_id, "enrollment revoked");
    Ok(())
}
