//! IPC command handlers.
//!
//! Each submodule implements the commands for one caller group. Handlers
//! authenticate from `params`, run the ledger operation under the database
//! lock, and emit domain events after the write has committed.

pub mod access;
pub mod admin;
pub mod billing;
pub mod certificates;
pub mod progress;

use std::sync::Arc;

use serde_json::Value;

use cursus_types::identity::VerifiedIdentity;

use crate::rpc::RpcError;
use crate::DaemonState;

/// Verify the caller's `session_token`.
pub(crate) fn authenticate(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result<VerifiedIdentity, RpcError> {
    let token = params
        .get("session_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::unauthenticated("session_token required"))?;
    Ok(state.identity.verify_identity(token, crate::clock::now_secs())?)
}

/// Verify the caller's session and require the admin role.
pub(crate) fn authenticate_admin(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result<VerifiedIdentity, RpcError> {
    let identity = authenticate(state, params)?;
    if !identity.is_admin() {
        return Err(RpcError::not_permitted("admin role required"));
    }
    Ok(identity)
}

pub(crate) fn required_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

pub(crate) fn optional_str<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Publish `EnrollmentStatusChanged` if the write moved the status.
pub(crate) fn emit_status_change(
    state: &Arc<DaemonState>,
    change: &cursus_access::store::EnrollmentChange,
    cause: &str,
    now: u64,
) {
    if !change.status_changed() {
        return;
    }
    let e = &change.enrollment;
    state.event_bus.emit(cursus_types::events::Event::new(
        cursus_types::events::EventType::EnrollmentStatusChanged,
        now,
        serde_json::json!({
            "user_id": e.user_id,
            "course_id": e.course_id,
            "previous_status": change.previous_status,
            "status": e.status,
            "cause": cause,
        }),
    ));
}

/// Shape returned for any enrollment write.
pub(crate) fn change_json(change: &cursus_access::store::EnrollmentChange) -> Value {
    let e = &change.enrollment;
    serde_json::json!({
        "user_id": e.user_id,
        "course_id": e.course_id,
        "status": e.status,
        "previous_status": change.previous_status,
        "payment_status": e.payment_status,
        "approval_status": e.approval_status,
        "subscription_status": e.subscription_status,
        "access_until": e.access_until,
    })
}
