//! Certificate commands.

use std::sync::Arc;

use serde_json::{json, Value};

use cursus_certificate::{issuer, registry};
use cursus_types::events::{Event, EventType};

use crate::clock;
use crate::commands::{authenticate, authenticate_admin, optional_str, required_str};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn to_json<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&format!("serialize: {e}")))
}

/// Issue the caller's certificate, or `user_id`'s when the caller is an admin.
/// Idempotent.
pub async fn issue_certificate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate(state, params)?;
    let course_id = required_str(params, "course_id")?;
    let user = optional_str(params, "user_id").unwrap_or(&caller.user_id).to_string();
    let course = course_id.to_string();
    let now = clock::now_secs();

    let config = state.config.issuer_config();
    let issuance = state
        .with_db(move |db| {
            Ok(issuer::issue_certificate(db, &config, &caller, &user, &course, now)?)
        })
        .await?;

    if !issuance.already_issued {
        let cert = &issuance.certificate;
        state.event_bus.emit(Event::new(
            EventType::CertificateIssued,
            now,
            json!({
                "user_id": cert.user_id,
                "course_id": cert.course_id,
                "certificate_id": cert.id,
                "code": cert.code,
            }),
        ));
    }
    to_json(&issuance.view())
}

/// Public lookup by verification code. No session required.
pub async fn verify_certificate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let code = required_str(params, "code")?.to_string();
    let verification = state
        .with_db(move |db| Ok(registry::verify_certificate(db, &code)?))
        .await?;
    to_json(&verification)
}

/// Certificates held by the caller, or by `user_id` for admins.
pub async fn list_certificates(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = authenticate(state, params)?;
    let user = optional_str(params, "user_id").unwrap_or(&caller.user_id).to_string();
    let certificates = state
        .with_db(move |db| Ok(registry::list_certificates(db, &caller, &user)?))
        .await?;
    to_json(&certificates)
}

/// Revoke a certificate by code.
pub async fn revoke_certificate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let admin = authenticate_admin(state, params)?;
    let code = required_str(params, "code")?.to_string();
    let reason = optional_str(params, "reason").map(str::to_string);
    let now = clock::now_secs();

    let retry = state.config.retry_policy();
    let cert_reason = reason.clone();
    let cert = state
        .with_db(move |db| {
            Ok(registry::revoke_certificate(
                db,
                retry,
                &admin,
                &code,
                cert_reason.as_deref(),
                now,
            )?)
        })
        .await?;

    state.event_bus.emit(Event::new(
        EventType::CertificateRevoked,
        now,
        json!({
            "user_id": cert.user_id,
            "course_id": cert.course_id,
            "code": cert.code,
            "reason": reason,
        }),
    ));
    Ok(json!({"revoked": true, "code": cert.code}))
}

#[cfg(test)]
mod tests {
    use crate::testutil::{call, complete_all, enroll_active, seed_course, test_state, token};
    use cursus_types::events::EventType;
    use cursus_types::identity::VerifiedIdentity;
    use serde_json::json;

    fn issue_params(who: &VerifiedIdentity, user: Option<&str>) -> serde_json::Value {
        let mut p = json!({"session_token": token(who), "course_id": "c1"});
        if let Some(user) = user {
            p["user_id"] = json!(user);
        }
        p
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let state = test_state();
        seed_course(&state, "c1", 3).await;
        enroll_active(&state, "u1", "c1").await;
        complete_all(&state, "u1", "c1", 3).await;
        let mut rx = state.event_bus.subscribe();

        let student = VerifiedIdentity::student("u1");
        let first = call(&state, "issue_certificate", issue_params(&student, None))
            .await
            .result
            .expect("issued");
        assert_eq!(first["already_issued"], false);
        assert_eq!(
            rx.try_recv().expect("event").event_type,
            EventType::CertificateIssued
        );

        let second = call(&state, "issue_certificate", issue_params(&student, None))
            .await
            .result
            .expect("repeat");
        assert_eq!(second["already_issued"], true);
        assert_eq!(second["code"], first["code"]);
        assert!(rx.try_recv().is_err());

        let verified = call(&state, "verify_certificate", json!({"code": first["code"]}))
            .await
            .result
            .expect("verify");
        assert_eq!(verified["valid"], true);
        assert_eq!(verified["course_id"], "c1");
        assert!(verified.get("user_id").is_none());
    }

    #[tokio::test]
    async fn test_issue_before_completion_reports_missing_percent() {
        let state = test_state();
        seed_course(&state, "c1", 4).await;
        enroll_active(&state, "u1", "c1").await;
        complete_all(&state, "u1", "c1", 3).await;

        let err = call(
            &state,
            "issue_certificate",
            issue_params(&VerifiedIdentity::student("u1"), None),
        )
        .await
        .error
        .expect("not complete");
        assert_eq!(err.code, -32030);
        let data = err.data.expect("data");
        assert_eq!(data["percent"], 75);
        assert_eq!(data["missing_percent"], 25);
    }

    #[tokio::test]
    async fn test_student_cannot_issue_for_another_user() {
        let state = test_state();
        seed_course(&state, "c1", 1).await;
        let err = call(
            &state,
            "issue_certificate",
            issue_params(&VerifiedIdentity::student("u2"), Some("u1")),
        )
        .await
        .error
        .expect("denied");
        assert_eq!(err.code, -32003);
    }

    #[tokio::test]
    async fn test_revoke_and_list() {
        let state = test_state();
        seed_course(&state, "c1", 1).await;
        enroll_active(&state, "u1", "c1").await;
        complete_all(&state, "u1", "c1", 1).await;

        let admin = VerifiedIdentity::admin("ops");
        let issued = call(&state, "issue_certificate", issue_params(&admin, Some("u1")))
            .await
            .result
            .expect("issued");
        let code = issued["code"].clone();

        let listed = call(
            &state,
            "list_certificates",
            json!({"session_token": token(&VerifiedIdentity::student("u1"))}),
        )
        .await
        .result
        .expect("list");
        assert_eq!(listed.as_array().expect("array").len(), 1);
        assert_eq!(listed[0]["issued_by"], "ops");

        let revoked = call(
            &state,
            "revoke_certificate",
            json!({"session_token": token(&admin), "code": code, "reason": "fraud"}),
        )
        .await
        .result
        .expect("revoke");
        assert_eq!(revoked["revoked"], true);

        let verified = call(&state, "verify_certificate", json!({"code": code}))
            .await
            .result
            .expect("verify");
        assert_eq!(verified["valid"], false);
    }

    #[tokio::test]
    async fn test_verify_unknown_code() {
        let state = test_state();
        let verified = call(&state, "verify_certificate", json!({"code": "crs-0000-0000-0000"}))
            .await
            .result
            .expect("verify");
        assert_eq!(verified["valid"], false);
        assert_eq!(verified["code"], "CRS-0000-0000-0000");
    }
}
