//! Access status for learners.

use std::sync::Arc;

use serde_json::Value;

use cursus_access::gate;
use cursus_db::queries::enrollments;

use crate::clock;
use crate::commands::{authenticate, required_str};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Caller's current access status for a course.
pub async fn request_access(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = authenticate(state, params)?;
    let course_id = required_str(params, "course_id")?;
    let now = clock::now_secs();

    let course = course_id.to_string();
    let (view, access_until) = state
        .with_db(move |db| {
            let view = gate::access_view(db, &identity.user_id, &course, now)?;
            let access_until = enrollments::find(db, &identity.user_id, &course)?
                .and_then(|e| e.access_until);
            Ok((view, access_until))
        })
        .await?;

    let mut result = serde_json::to_value(&view)
        .map_err(|e| RpcError::internal_error(&format!("serialize: {e}")))?;
    if let (Some(until), Some(obj)) = (access_until, result.as_object_mut()) {
        obj.insert("access_until".into(), until.into());
        obj.insert("days_remaining".into(), clock::days_remaining(now, until).into());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::testutil::{call, seed_course, test_state, token};
    use cursus_types::identity::VerifiedIdentity;
    use serde_json::json;

    #[tokio::test]
    async fn test_request_access_not_enrolled() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        let resp = call(
            &state,
            "request_access",
            json!({"session_token": token(&VerifiedIdentity::student("u1")), "course_id": "c1"}),
        )
        .await;
        let view = resp.result.expect("result");
        assert_eq!(view["can_consume"], false);
        assert_eq!(view["access_status"], "awaiting_payment");
        assert_eq!(view["reason"], "not enrolled in this course");
    }

    #[tokio::test]
    async fn test_request_access_requires_session() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        let resp = call(&state, "request_access", json!({"course_id": "c1"})).await;
        assert_eq!(resp.error.expect("error").code, -32001);

        let resp = call(
            &state,
            "request_access",
            json!({"session_token": "forged.token", "course_id": "c1"}),
        )
        .await;
        assert_eq!(resp.error.expect("error").code, -32001);
    }

    #[tokio::test]
    async fn test_unknown_course() {
        let state = test_state();
        let resp = call(
            &state,
            "request_access",
            json!({"session_token": token(&VerifiedIdentity::student("u1")), "course_id": "nope"}),
        )
        .await;
        assert_eq!(resp.error.expect("error").code, -32010);
    }
}
