//! Enrollment records and the signals that govern them.

use serde::{Deserialize, Serialize};

use crate::{CourseId, UserId, PERCENT_COMPLETE};

/// Stored status of an enrollment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Pending,
    Completed,
    Canceled,
    Rejected,
    Expired,
}

crate::status_enum!(EnrollmentStatus, "enrollment status", {
    Active => "active",
    Pending => "pending",
    Completed => "completed",
    Canceled => "canceled",
    Rejected => "rejected",
    Expired => "expired",
});

impl EnrollmentStatus {
    /// Whether this status lets the student read course content.
    pub fn grants_content_access(self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Completed)
    }
}

/// Payment state reported by the payment processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

crate::status_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Administrative review state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    PendingReview,
    Approved,
    Rejected,
}

crate::status_enum!(ApprovalStatus, "approval status", {
    PendingReview => "pending_review",
    Approved => "approved",
    Rejected => "rejected",
});

/// Subscription lifecycle as reported by the payment processor.
///
/// One-time purchases carry `Active` for their whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
}

crate::status_enum!(SubscriptionStatus, "subscription status", {
    Active => "active",
    Trialing => "trialing",
    PastDue => "past_due",
    Unpaid => "unpaid",
    Canceled => "canceled",
    Incomplete => "incomplete",
    IncompleteExpired => "incomplete_expired",
    Paused => "paused",
});

/// Access status derived from the three signals above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Active,
    AwaitingApproval,
    AwaitingPayment,
    Blocked,
    Canceled,
    Rejected,
}

crate::status_enum!(AccessStatus, "access status", {
    Active => "active",
    AwaitingApproval => "awaiting_approval",
    AwaitingPayment => "awaiting_payment",
    Blocked => "blocked",
    Canceled => "canceled",
    Rejected => "rejected",
});

/// Cached completion summary stored on the enrollment.
///
/// Always derivable from the completed lesson-progress rows of the pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ProgressAggregate {
    pub completed_lesson_count: u32,
    pub total_lessons: u32,
    pub percent: u8,
}

impl ProgressAggregate {
    /// Build an aggregate, deriving `percent` from the two counts.
    pub fn new(completed_lesson_count: u32, total_lessons: u32) -> Self {
        Self {
            completed_lesson_count,
            total_lessons,
            percent: Self::percent_of(completed_lesson_count, total_lessons),
        }
    }

    /// `round(100 * completed / total)` clamped to `[0, 100]`; zero when `total` is zero.
    pub fn percent_of(completed: u32, total: u32) -> u8 {
        if total == 0 {
            return 0;
        }
        let completed = u64::from(completed);
        let total = u64::from(total);
        // Half-up rounding in integer arithmetic.
        let rounded = (200 * completed + total) / (2 * total);
        rounded.min(u64::from(PERCENT_COMPLETE)) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= PERCENT_COMPLETE
    }
}

/// A user's relationship to a course, keyed by `(user_id, course_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
    pub approval_status: ApprovalStatus,
    pub subscription_status: SubscriptionStatus,
    pub progress: ProgressAggregate,
    /// Course content revision at the time of enrollment.
    pub course_revision: u32,
    pub created_at: u64,
    pub updated_at: u64,
    pub paid_at: Option<u64>,
    pub approved_at: Option<u64>,
    pub last_accessed_at: Option<u64>,
    pub completed_at: Option<u64>,
    /// End of the paid subscription period, when the processor reports one.
    pub access_until: Option<u64>,
}

impl Enrollment {
    /// A fresh enrollment created by a first payment or application intent.
    pub fn new(user_id: &str, course_id: &str, total_lessons: u32, course_revision: u32, now: u64) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            status: EnrollmentStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            approval_status: ApprovalStatus::PendingReview,
            subscription_status: SubscriptionStatus::Active,
            progress: ProgressAggregate::new(0, total_lessons),
            course_revision,
            created_at: now,
            updated_at: now,
            paid_at: None,
            approved_at: None,
            last_accessed_at: None,
            completed_at: None,
            access_until: None,
        }
    }

    /// True when a subscription window is recorded and has elapsed at `now`.
    pub fn access_window_elapsed(&self, now: u64) -> bool {
        self.access_until.is_some_and(|until| now >= until)
    }
}

/// Caller-facing view returned by `request_access`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct AccessView {
    pub course_id: CourseId,
    pub access_status: AccessStatus,
    pub enrollment_status: Option<EnrollmentStatus>,
    /// Whether lesson content may be served right now.
    pub can_consume: bool,
    pub progress: Option<ProgressAggregate>,
    /// Human-readable denial reason when `can_consume` is false.
    pub reason: Option<String>,
}
