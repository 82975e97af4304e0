//! Payment-processor signals.
//!
//! A signal is applied at most once per processor event id. The claim on the
//! event id commits first, in its own transaction; the enrollment update and
//! the `done` mark commit together in a second one. A failure while applying
//! marks the event `error` so the processor's redelivery can retry it.

use rusqlite::Connection;

use cursus_crypto::webhook::WebhookKey;
use cursus_db::queries::payment_events::{self, Claim};
use cursus_db::{transact, RetryPolicy};
use cursus_types::enrollment::{Enrollment, PaymentStatus, SubscriptionStatus};
use cursus_types::signal::{PaymentSignal, SignalEnvelope};

use crate::store::{self, EnrollmentChange};
use crate::{AccessError, Result};

/// Actor recorded in the audit log for signal-driven changes.
pub const SIGNAL_ACTOR: &str = "payment-webhook";

/// Tuning for signal application.
#[derive(Debug, Clone, Copy)]
pub struct SignalOptions {
    pub retry: RetryPolicy,
    /// After this long a `processing` claim is presumed abandoned.
    pub stale_after_secs: u64,
}

impl Default for SignalOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            stale_after_secs: 300,
        }
    }
}

/// What happened to a delivered signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied(EnrollmentChange),
    /// The event id was already applied; nothing changed.
    Duplicate,
    /// Another delivery of the same event id is being applied.
    InFlight,
}

/// Verify the webhook signature, then apply the signal.
///
/// # Errors
///
/// - [`AccessError::InvalidSignature`] if the signature does not verify
/// - anything [`apply_payment_signal`] returns
pub fn verify_and_apply(
    conn: &mut Connection,
    key: &WebhookKey,
    envelope: &SignalEnvelope,
    signature: &str,
    opts: &SignalOptions,
    now: u64,
) -> Result<SignalOutcome> {
    if key.verify(envelope, signature).is_err() {
        tracing::warn!(
            event_id = %envelope.event_id,
            user_id = %envelope.user_id,
            course_id = %envelope.course_id,
            "rejected payment signal with bad signature"
        );
        return Err(AccessError::InvalidSignature);
    }
    apply_payment_signal(conn, envelope, opts, now)
}

/// Apply a payment signal to its enrollment.
///
/// `checkout_started` and `payment_succeeded` create the enrollment if it
/// does not exist yet; every other signal requires one.
///
/// # Errors
///
/// - [`AccessError::EnrollmentNotFound`] for a signal that needs an existing enrollment
/// - [`AccessError::CourseUnavailable`] if a new enrollment names an unknown course
/// - [`AccessError::Db`] on store failures, including exhausted conflict retries
pub fn apply_payment_signal(
    conn: &mut Connection,
    envelope: &SignalEnvelope,
    opts: &SignalOptions,
    now: u64,
) -> Result<SignalOutcome> {
    let SignalEnvelope {
        event_id,
        user_id,
        course_id,
        signal,
    } = envelope;

    let claim = transact(conn, opts.retry, |tx| {
        payment_events::claim(
            tx,
            event_id,
            user_id,
            course_id,
            signal.kind(),
            now,
            opts.stale_after_secs,
        )
        .map_err(AccessError::from)
    })?;

    match claim {
        Claim::AlreadyDone => {
            tracing::debug!(%event_id, "payment signal already applied");
            return Ok(SignalOutcome::Duplicate);
        }
        Claim::InFlight => {
            tracing::debug!(%event_id, "payment signal in flight");
            return Ok(SignalOutcome::InFlight);
        }
        Claim::Retry { attempts } => {
            tracing::info!(%event_id, attempts, "retrying payment signal");
        }
        Claim::Fresh => {}
    }

    let creates = matches!(
        signal,
        PaymentSignal::CheckoutStarted | PaymentSignal::PaymentSucceeded { .. }
    );
    let applied = transact(conn, opts.retry, |tx| -> Result<EnrollmentChange> {
        let mut loaded = store::load(tx, user_id, course_id, creates, now)?;
        apply_signal_fields(&mut loaded.enrollment, signal, now);
        let change = store::settle(tx, loaded, SIGNAL_ACTOR, signal.kind(), now)?;
        payment_events::mark_done(tx, event_id, now)?;
        Ok(change)
    });

    match applied {
        Ok(change) => {
            tracing::info!(
                %event_id,
                %user_id,
                %course_id,
                kind = signal.kind(),
                status = %change.enrollment.status,
                "payment signal applied"
            );
            Ok(SignalOutcome::Applied(change))
        }
        Err(err) => {
            let message = err.to_string();
            let marked = transact(conn, opts.retry, |tx| {
                payment_events::mark_error(tx, event_id, &message, now)
            });
            if let Err(mark_err) = marked {
                tracing::error!(%event_id, error = %mark_err, "failed to record signal error");
            }
            tracing::warn!(%event_id, error = %err, "payment signal failed");
            Err(err)
        }
    }
}

/// Fold one signal into the enrollment's signal fields.
pub fn apply_signal_fields(enrollment: &mut Enrollment, signal: &PaymentSignal, now: u64) {
    match *signal {
        PaymentSignal::CheckoutStarted => {
            if enrollment.payment_status == PaymentStatus::Unpaid {
                enrollment.payment_status = PaymentStatus::Pending;
            }
        }
        PaymentSignal::PaymentSucceeded { access_until } => {
            enrollment.payment_status = PaymentStatus::Paid;
            enrollment.paid_at = Some(now);
            if access_until.is_some() {
                enrollment.access_until = access_until;
            }
        }
        PaymentSignal::PaymentFailed => enrollment.payment_status = PaymentStatus::Failed,
        PaymentSignal::Refunded => enrollment.payment_status = PaymentStatus::Refunded,
        PaymentSignal::SubscriptionChanged {
            status,
            current_period_end,
        } => {
            enrollment.subscription_status = status;
            if current_period_end.is_some() {
                enrollment.access_until = current_period_end;
            }
        }
        PaymentSignal::SubscriptionDeleted => {
            enrollment.subscription_status = SubscriptionStatus::Canceled;
        }
    }
}
