//! Administrative enrollment commands.

use std::sync::Arc;

use serde_json::{json, Value};

use cursus_access::admin;
use cursus_types::events::{Event, EventType};

use crate::clock;
use crate::commands::{authenticate_admin, change_json, emit_status_change, optional_str, required_str};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Grant access manually.
pub async fn open_enrollment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate_admin(state, params)?;
    let user_id = required_str(params, "user_id")?;
    let course_id = required_str(params, "course_id")?;
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let (user, course) = (user_id.to_string(), course_id.to_string());
    let change = state
        .with_db(move |db| Ok(admin::open_enrollment(db, retry, &caller, &user, &course, now)?))
        .await?;

    emit_status_change(state, &change, "manual_grant", now);
    Ok(change_json(&change))
}

pub async fn approve_enrollment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate_admin(state, params)?;
    let user_id = required_str(params, "user_id")?;
    let course_id = required_str(params, "course_id")?;
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let (user, course) = (user_id.to_string(), course_id.to_string());
    let change = state
        .with_db(move |db| Ok(admin::approve_enrollment(db, retry, &caller, &user, &course, now)?))
        .await?;

    emit_status_change(state, &change, "approved", now);
    Ok(change_json(&change))
}

pub async fn reject_enrollment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate_admin(state, params)?;
    let user_id = required_str(params, "user_id")?;
    let course_id = required_str(params, "course_id")?;
    let reason = optional_str(params, "reason").unwrap_or("").to_string();
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let (user, course) = (user_id.to_string(), course_id.to_string());
    let change = state
        .with_db(move |db| {
            Ok(admin::reject_enrollment(db, retry, &caller, &user, &course, &reason, now)?)
        })
        .await?;

    emit_status_change(state, &change, "rejected", now);
    Ok(change_json(&change))
}

/// Delete an enrollment. Progress and certificates stay.
pub async fn revoke_enrollment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate_admin(state, params)?;
    let user_id = required_str(params, "user_id")?;
    let course_id = required_str(params, "course_id")?;
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let admin_id = caller.user_id.clone();
    let (user, course) = (user_id.to_string(), course_id.to_string());
    state
        .with_db(move |db| Ok(admin::revoke_enrollment(db, retry, &caller, &user, &course, now)?))
        .await?;

    state.event_bus.emit(Event::new(
        EventType::EnrollmentRevoked,
        now,
        json!({"user_id": user_id, "course_id": course_id, "admin": admin_id}),
    ));
    Ok(json!({"revoked": true}))
}
