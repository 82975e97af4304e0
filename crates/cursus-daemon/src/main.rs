//! cursus-daemon: the enrollment and progress ledger service.
//!
//! Single OS process running a Tokio runtime. Course frontends, the payment
//! webhook adapter and admin tooling talk to it via JSON-RPC over a Unix
//! socket.

mod clock;
mod commands;
mod config;
mod events;
mod rpc;

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use cursus_access::identity::{IdentityVerifier, SessionTokenVerifier};
use cursus_crypto::session::SessionKey;
use cursus_crypto::webhook::WebhookKey;
use cursus_types::events::{Event, EventType};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Verifies session tokens presented by callers.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Verifies payment signals forwarded by the webhook adapter.
    pub webhook_key: WebhookKey,
    /// Event bus for downstream collaborators.
    pub event_bus: EventBus,
}

impl DaemonState {
    /// Run a ledger operation on the blocking pool while holding the
    /// database lock. Transaction retries sleep, and SQLite waits out its
    /// busy timeout, so neither may run on a runtime worker.
    pub async fn with_db<T, F>(&self, op: F) -> Result<T, rpc::RpcError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, rpc::RpcError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.blocking_lock();
            op(&mut conn)
        })
        .await
        .map_err(|e| rpc::RpcError::internal_error(&format!("ledger task failed: {e}")))?
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("cursus={}", config.advanced.log_level).parse()?);
    if config.advanced.log_file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.advanced.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }

    info!("Cursus daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Key material
    let secrets = config.load_secrets()?;
    let session_key = SessionKey::new(secrets.session.as_bytes(), config.auth.clock_leeway_secs)?;
    let webhook_key = WebhookKey::new(secrets.webhook.as_bytes())?;
    drop(secrets);

    // 4. Open database
    let db_path = data_dir.join(&config.storage.db_file);
    let conn = cursus_db::open_with_busy_timeout(&db_path, config.ledger.busy_timeout_ms)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 5. Event bus
    let event_bus = EventBus::new(1000);

    let state = Arc::new(DaemonState {
        db,
        config,
        identity: Arc::new(SessionTokenVerifier::new(session_key)),
        webhook_key,
        event_bus,
    });

    // 6. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    state.event_bus.emit(Event::new(
        EventType::DaemonStarted,
        clock::now_secs(),
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    ));

    // 7. Run the RPC server until shutdown
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = terminate.recv() => {
            info!("SIGTERM received, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");

    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
