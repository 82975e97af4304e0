//! Payment-processor signals consumed by the ledger.
//!
//! The ledger never originates these. A webhook adapter translates processor
//! events into [`PaymentSignal`]s, signs them and forwards them together with
//! the processor's event id so replays can be detected.

use serde::{Deserialize, Serialize};

use crate::enrollment::SubscriptionStatus;
use crate::{CourseId, UserId};

/// A change reported by the payment processor for one `(user, course)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentSignal {
    /// A checkout session was opened. Creates the pending enrollment.
    CheckoutStarted,
    /// Payment captured. Subscriptions report the end of the paid period.
    PaymentSucceeded {
        #[serde(default)]
        access_until: Option<u64>,
    },
    PaymentFailed,
    Refunded,
    SubscriptionChanged {
        status: SubscriptionStatus,
        #[serde(default)]
        current_period_end: Option<u64>,
    },
    SubscriptionDeleted,
}

impl PaymentSignal {
    /// Stable name used in logs and the payment-event ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentSignal::CheckoutStarted => "checkout_started",
            PaymentSignal::PaymentSucceeded { .. } => "payment_succeeded",
            PaymentSignal::PaymentFailed => "payment_failed",
            PaymentSignal::Refunded => "refunded",
            PaymentSignal::SubscriptionChanged { .. } => "subscription_changed",
            PaymentSignal::SubscriptionDeleted => "subscription_deleted",
        }
    }
}

/// A signal together with its routing and replay-detection fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Processor-assigned event id; unique per delivery attempt group.
    pub event_id: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub signal: PaymentSignal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_wire_form() {
        let json = serde_json::to_value(PaymentSignal::SubscriptionChanged {
            status: SubscriptionStatus::PastDue,
            current_period_end: Some(1_800_000_000),
        })
        .expect("serialize");
        assert_eq!(json["kind"], "subscription_changed");
        assert_eq!(json["status"], "past_due");

        let parsed: PaymentSignal =
            serde_json::from_str(r#"{"kind":"payment_succeeded"}"#).expect("parse");
        assert_eq!(parsed, PaymentSignal::PaymentSucceeded { access_until: None });
        assert_eq!(parsed.kind(), "payment_succeeded");
    }

    #[test]
    fn test_unknown_signal_rejected() {
        assert!(serde_json::from_str::<PaymentSignal>(r#"{"kind":"chargeback"}"#).is_err());
    }
}
