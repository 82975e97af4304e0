//! Lesson progress commands.

use std::sync::Arc;

use serde_json::{json, Value};

use cursus_progress::plan::LessonRef;
use cursus_progress::{reconcile, tracker};
use cursus_types::events::{Event, EventType};
use cursus_types::progress::ProgressObservation;

use crate::clock;
use crate::commands::{authenticate, authenticate_admin, required_str};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Record a progress observation for the caller.
pub async fn record_progress(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = authenticate(state, params)?;
    let lesson = LessonRef {
        course_id: required_str(params, "course_id")?,
        module_id: required_str(params, "module_id")?,
        lesson_id: required_str(params, "lesson_id")?,
    };
    let observed: ProgressObservation = serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_params(&format!("bad observation: {e}")))?;
    if observed.percent.is_some_and(|p| p > 100) {
        return Err(RpcError::invalid_params("percent must be at most 100"));
    }
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let user = identity.user_id.clone();
    let (course, module, lesson_id) = (
        lesson.course_id.to_string(),
        lesson.module_id.to_string(),
        lesson.lesson_id.to_string(),
    );
    let outcome = state
        .with_db(move |db| {
            let lesson = LessonRef {
                course_id: &course,
                module_id: &module,
                lesson_id: &lesson_id,
            };
            Ok(tracker::record_progress(db, retry, &user, lesson, &observed, now)?)
        })
        .await?;

    if outcome.newly_completed {
        let aggregate = outcome.aggregate;
        state.event_bus.emit(Event::new(
            EventType::LessonCompleted,
            now,
            json!({
                "user_id": identity.user_id,
                "course_id": lesson.course_id,
                "module_id": lesson.module_id,
                "lesson_id": lesson.lesson_id,
                "progress": aggregate,
            }),
        ));
        if aggregate.is_complete() {
            state.event_bus.emit(Event::new(
                EventType::CourseCompleted,
                now,
                json!({
                    "user_id": identity.user_id,
                    "course_id": lesson.course_id,
                    "progress": aggregate,
                }),
            ));
        }
    }

    Ok(json!({
        "success": true,
        "lesson_status": outcome.progress.status,
        "lesson_percent": outcome.progress.percent,
        "newly_completed": outcome.newly_completed,
        "progress": outcome.aggregate,
    }))
}

/// Rebuild an enrollment's cached aggregate from its lesson records.
pub async fn reconcile_progress(state: &Arc<DaemonState>, params: &Value) -> Result {
    let admin = authenticate_admin(state, params)?;
    let user_id = required_str(params, "user_id")?;
    let course_id = required_str(params, "course_id")?;

    let retry = state.config.retry_policy();
    let (user, course) = (user_id.to_string(), course_id.to_string());
    let (aggregate, changed) = state
        .with_db(move |db| {
            Ok(reconcile::reconcile_aggregate(db, retry, &user, &course, clock::now_secs())?)
        })
        .await?;

    tracing::info!(admin = %admin.user_id, user_id, course_id, changed, "progress reconciled");
    Ok(json!({"progress": aggregate, "changed": changed}))
}

#[cfg(test)]
mod tests {
    use crate::testutil::{call, enroll_active, seed_course, test_state, token};
    use cursus_types::events::EventType;
    use cursus_types::identity::VerifiedIdentity;
    use serde_json::json;

    fn complete(user: &str, lesson: &str) -> serde_json::Value {
        json!({
            "session_token": token(&VerifiedIdentity::student(user)),
            "course_id": "c1",
            "module_id": "m1",
            "lesson_id": lesson,
            "status": "completed",
        })
    }

    #[tokio::test]
    async fn test_record_progress_emits_events() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        enroll_active(&state, "u1", "c1").await;
        let mut rx = state.event_bus.subscribe();

        let resp = call(&state, "record_progress", complete("u1", "l1")).await;
        let result = resp.result.expect("result");
        assert_eq!(result["success"], true);
        assert_eq!(result["newly_completed"], true);
        assert_eq!(result["progress"]["percent"], 50);
        assert_eq!(
            rx.try_recv().expect("lesson event").event_type,
            EventType::LessonCompleted
        );

        // Repeat completion changes nothing and emits nothing.
        let resp = call(&state, "record_progress", complete("u1", "l1")).await;
        assert_eq!(resp.result.expect("result")["newly_completed"], false);
        assert!(rx.try_recv().is_err());

        call(&state, "record_progress", complete("u1", "l2")).await;
        assert_eq!(
            rx.try_recv().expect("lesson event").event_type,
            EventType::LessonCompleted
        );
        assert_eq!(
            rx.try_recv().expect("course event").event_type,
            EventType::CourseCompleted
        );
    }

    #[tokio::test]
    async fn test_record_progress_denied_without_enrollment() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        let resp = call(&state, "record_progress", complete("u1", "l1")).await;
        let err = resp.error.expect("error");
        assert_eq!(err.code, -32011);
        assert_eq!(err.data.expect("data")["reason"], "not_enrolled");
    }

    #[tokio::test]
    async fn test_record_progress_unknown_lesson() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        enroll_active(&state, "u1", "c1").await;
        let resp = call(&state, "record_progress", complete("u1", "l99")).await;
        assert_eq!(resp.error.expect("error").code, -32602);
    }

    #[tokio::test]
    async fn test_reconcile_requires_admin() {
        let state = test_state();
        seed_course(&state, "c1", 2).await;
        enroll_active(&state, "u1", "c1").await;

        let params = |who: &VerifiedIdentity| {
            json!({"session_token": token(who), "user_id": "u1", "course_id": "c1"})
        };
        let resp = call(&state, "reconcile_progress", params(&VerifiedIdentity::student("u1"))).await;
        assert_eq!(resp.error.expect("error").code, -32003);

        let resp = call(&state, "reconcile_progress", params(&VerifiedIdentity::admin("ops"))).await;
        let result = resp.result.expect("result");
        assert_eq!(result["progress"]["total_lessons"], 2);
    }
}
