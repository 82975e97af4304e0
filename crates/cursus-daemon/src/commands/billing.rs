//! Payment signals from the webhook adapter.

use std::sync::Arc;

use serde_json::{json, Value};

use cursus_access::signals::{self, SignalOutcome};
use cursus_types::events::{Event, EventType};
use cursus_types::signal::SignalEnvelope;

use crate::clock;
use crate::commands::{change_json, emit_status_change, required_str};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Apply a signed payment signal. Redeliveries of an applied event are
/// acknowledged without effect.
pub async fn payment_signal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let signature = required_str(params, "signature")?.to_string();
    let envelope: SignalEnvelope = serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_params(&format!("bad signal: {e}")))?;
    let now = clock::now_secs();

    let key = state.webhook_key.clone();
    let options = state.config.signal_options();
    let signal = envelope.clone();
    let outcome = state
        .with_db(move |db| {
            Ok(signals::verify_and_apply(db, &key, &signal, &signature, &options, now)?)
        })
        .await?;

    match outcome {
        SignalOutcome::Applied(change) => {
            let kind = envelope.signal.kind();
            state.event_bus.emit(Event::new(
                EventType::PaymentSignalApplied,
                now,
                json!({
                    "event_id": envelope.event_id,
                    "user_id": envelope.user_id,
                    "course_id": envelope.course_id,
                    "kind": kind,
                }),
            ));
            emit_status_change(state, &change, kind, now);
            let mut result = change_json(&change);
            if let Some(obj) = result.as_object_mut() {
                obj.insert("outcome".into(), "applied".into());
            }
            Ok(result)
        }
        SignalOutcome::Duplicate => Ok(json!({"outcome": "duplicate"})),
        SignalOutcome::InFlight => Ok(json!({"outcome": "in_flight"})),
    }
}
