//! Access policy: a total, first-match decision table.
//!
//! | # | Condition                                                         | Result              |
//! |---|-------------------------------------------------------------------|---------------------|
//! | 1 | approval = rejected                                               | `rejected`          |
//! | 2 | subscription ∈ {canceled, unpaid}                                 | `canceled`          |
//! | 3 | payment ∈ {failed, refunded} or subscription ∈ {past_due, incomplete_expired} | `blocked` |
//! | 4 | payment = paid and approval = pending_review                      | `awaiting_approval` |
//! | 5 | payment = paid, approval = approved, subscription ∈ {active, trialing} | `active`       |
//! | 6 | otherwise                                                         | `awaiting_payment`  |
//!
//! The match arms below are the table, in order. The compiler checks the
//! match is exhaustive; the tests check every combination.

use cursus_types::enrollment::{
    AccessStatus, ApprovalStatus, Enrollment, EnrollmentStatus, PaymentStatus, SubscriptionStatus,
};

/// Map the three independent signals to one access status.
pub fn compute_access_status(
    payment: PaymentStatus,
    approval: ApprovalStatus,
    subscription: SubscriptionStatus,
) -> AccessStatus {
    use ApprovalStatus as A;
    use PaymentStatus as P;
    use SubscriptionStatus as S;

    match (payment, approval, subscription) {
        (_, A::Rejected, _) => AccessStatus::Rejected,
        (_, _, S::Canceled | S::Unpaid) => AccessStatus::Canceled,
        (P::Failed | P::Refunded, _, _) | (_, _, S::PastDue | S::IncompleteExpired) => {
            AccessStatus::Blocked
        }
        (P::Paid, A::PendingReview, _) => AccessStatus::AwaitingApproval,
        (P::Paid, A::Approved, S::Active | S::Trialing) => AccessStatus::Active,
        _ => AccessStatus::AwaitingPayment,
    }
}

/// Access status of a stored enrollment.
pub fn access_status_of(enrollment: &Enrollment) -> AccessStatus {
    compute_access_status(
        enrollment.payment_status,
        enrollment.approval_status,
        enrollment.subscription_status,
    )
}

/// Stored enrollment status implied by an access status.
///
/// `Completed` survives while access stays `Active`; any other access status
/// overrides it.
pub fn enrollment_status_for(access: AccessStatus, current: EnrollmentStatus) -> EnrollmentStatus {
    match access {
        AccessStatus::Active if current == EnrollmentStatus::Completed => EnrollmentStatus::Completed,
        AccessStatus::Active => EnrollmentStatus::Active,
        AccessStatus::AwaitingApproval | AccessStatus::AwaitingPayment => EnrollmentStatus::Pending,
        AccessStatus::Blocked => EnrollmentStatus::Expired,
        AccessStatus::Canceled => EnrollmentStatus::Canceled,
        AccessStatus::Rejected => EnrollmentStatus::Rejected,
    }
}
