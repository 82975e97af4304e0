//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC calls to the command handlers. A connection
//! that calls `subscribe_events` becomes a one-way stream of event
//! notifications.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use cursus_access::AccessError;
use cursus_certificate::CertificateError;
use cursus_db::DbError;
use cursus_progress::ProgressError;

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Server-initiated message without an id.
#[derive(Debug, Serialize)]
pub struct RpcNotification<'a, T: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: T,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Stable numeric code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            -32601,
            "METHOD_NOT_FOUND",
            Some(serde_json::json!({"method": method})),
        )
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::new(
            -32602,
            "INVALID_PARAMS",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::new(
            -32603,
            "INTERNAL_ERROR",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    // Ledger errors

    /// Unauthenticated (-32001).
    pub fn unauthenticated(detail: &str) -> Self {
        Self::new(
            -32001,
            "UNAUTHENTICATED",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Caller lacks the role for this action (-32003).
    pub fn not_permitted(detail: &str) -> Self {
        Self::new(
            -32003,
            "NOT_PERMITTED",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Course missing, unpublished or archived (-32010).
    pub fn course_unavailable(course_id: &str) -> Self {
        Self::new(
            -32010,
            "COURSE_UNAVAILABLE",
            Some(serde_json::json!({"course_id": course_id})),
        )
    }

    /// No usable enrollment (-32011).
    pub fn access_denied(course_id: &str, reason: serde_json::Value) -> Self {
        let mut data = serde_json::json!({"course_id": course_id});
        if let (Some(data), serde_json::Value::Object(reason)) = (data.as_object_mut(), reason) {
            data.extend(reason);
        }
        Self::new(-32011, "ACCESS_DENIED", Some(data))
    }

    /// No enrollment where one is required (-32012).
    pub fn enrollment_not_found(user_id: &str, course_id: &str) -> Self {
        Self::new(
            -32012,
            "ENROLLMENT_NOT_FOUND",
            Some(serde_json::json!({"user_id": user_id, "course_id": course_id})),
        )
    }

    /// Enrollment stopped being active mid-request (-32021).
    pub fn enrollment_inactive() -> Self {
        Self::new(-32021, "ENROLLMENT_INACTIVE", None)
    }

    /// Course not finished (-32030).
    pub fn not_complete(completed: u32, required: u32, percent: u8) -> Self {
        Self::new(
            -32030,
            "NOT_COMPLETE",
            Some(serde_json::json!({
                "completed": completed,
                "required": required,
                "percent": percent,
                "missing_percent": 100 - percent.min(100),
            })),
        )
    }

    /// Unknown certificate code (-32031).
    pub fn certificate_not_found(code: &str) -> Self {
        Self::new(
            -32031,
            "CERTIFICATE_NOT_FOUND",
            Some(serde_json::json!({"code": code})),
        )
    }

    /// Payment signal signature did not verify (-32040).
    pub fn invalid_signature() -> Self {
        Self::new(-32040, "INVALID_SIGNATURE", None)
    }

    /// Transaction kept conflicting; the caller may retry (-32050).
    pub fn transaction_conflict(attempts: u32) -> Self {
        Self::new(
            -32050,
            "TRANSACTION_CONFLICT",
            Some(serde_json::json!({"attempts": attempts, "retryable": true})),
        )
    }
}

impl From<DbError> for RpcError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { attempts } => {
                warn!(attempts, "transaction conflict surfaced to caller");
                RpcError::transaction_conflict(attempts)
            }
            other => {
                error!(error = %other, "store failure");
                RpcError::internal_error("store failure")
            }
        }
    }
}

impl From<AccessError> for RpcError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated(detail) => RpcError::unauthenticated(&detail),
            AccessError::CourseUnavailable { course_id } => RpcError::course_unavailable(&course_id),
            AccessError::AccessDenied { course_id, reason } => {
                let mut reason_json = serde_json::to_value(reason).unwrap_or_default();
                if let Some(obj) = reason_json.as_object_mut() {
                    obj.insert("detail".into(), reason.to_string().into());
                }
                RpcError::access_denied(&course_id, reason_json)
            }
            AccessError::NotPermitted(detail) => RpcError::not_permitted(&detail),
            AccessError::EnrollmentNotFound { user_id, course_id } => {
                RpcError::enrollment_not_found(&user_id, &course_id)
            }
            AccessError::InvalidSignature => RpcError::invalid_signature(),
            AccessError::Db(e) => e.into(),
        }
    }
}

impl From<ProgressError> for RpcError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Access(e) => e.into(),
            // Logged with detail by the tracker; callers learn nothing more.
            ProgressError::InvalidContext { .. } => RpcError::invalid_params("invalid lesson reference"),
            ProgressError::EnrollmentInactive { .. } => RpcError::enrollment_inactive(),
            ProgressError::Db(e) => e.into(),
        }
    }
}

impl From<CertificateError> for RpcError {
    fn from(err: CertificateError) -> Self {
        match err {
            CertificateError::Access(e) => e.into(),
            CertificateError::NotComplete {
                completed,
                required,
                percent,
            } => RpcError::not_complete(completed, required, percent),
            CertificateError::NotFound(code) => RpcError::certificate_not_found(&code),
            CertificateError::NotPermitted(detail) => RpcError::not_permitted(&detail),
            CertificateError::CodeSpaceExhausted { attempts } => {
                error!(attempts, "certificate code space exhausted");
                RpcError::internal_error("could not allocate certificate code")
            }
            CertificateError::Db(e) => e.into(),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(_) => {
                let response = RpcResponse::error(serde_json::Value::Null, RpcError::parse_error());
                write_message(&mut writer, &response).await?;
                continue;
            }
        };

        if request.method == "subscribe_events" {
            match serde_json::from_value::<Option<EventFilter>>(request.params) {
                Ok(filter) => {
                    return stream_events(&state, request.id, filter.unwrap_or_default(), &mut writer)
                        .await;
                }
                Err(e) => {
                    let err = RpcError::invalid_params(&format!("bad filter: {e}"));
                    write_message(&mut writer, &RpcResponse::error(request.id, err)).await?;
                    continue;
                }
            }
        }

        let response = dispatch_request(state.clone(), request).await;
        write_message(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Acknowledge the subscription, then forward matching events until the
/// client goes away.
async fn stream_events<W>(
    state: &Arc<DaemonState>,
    id: serde_json::Value,
    filter: EventFilter,
    writer: &mut W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut rx = state.event_bus.subscribe();
    let ack = serde_json::json!({"subscribed": true, "sequence": state.event_bus.sequence()});
    write_message(writer, &RpcResponse::success(id, ack)).await?;

    loop {
        match rx.recv().await {
            Ok(event) if filter.matches(&event) => {
                let note = RpcNotification {
                    jsonrpc: "2.0",
                    method: "event",
                    params: &event,
                };
                write_message(writer, &note).await?;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event subscriber lagged"),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let params = &request.params;
    let result = match method {
        // Learner commands
        "request_access" => commands::access::request_access(&state, params).await,
        "record_progress" => commands::progress::record_progress(&state, params).await,
        "issue_certificate" => commands::certificates::issue_certificate(&state, params).await,
        "list_certificates" => commands::certificates::list_certificates(&state, params).await,

        // Public
        "verify_certificate" => commands::certificates::verify_certificate(&state, params).await,

        // Payment webhook adapter
        "payment_signal" => commands::billing::payment_signal(&state, params).await,

        // Admin commands
        "open_enrollment" => commands::admin::open_enrollment(&state, params).await,
        "approve_enrollment" => commands::admin::approve_enrollment(&state, params).await,
        "reject_enrollment" => commands::admin::reject_enrollment(&state, params).await,
        "revoke_enrollment" => commands::admin::revoke_enrollment(&state, params).await,
        "revoke_certificate" => commands::certificates::revoke_certificate(&state, params).await,
        "reconcile_progress" => commands::progress::reconcile_progress(&state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
