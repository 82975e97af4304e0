//! Configuration file management.
//!
//! `config.toml` lives in the data directory. Key material is never stored
//! there: the file names the environment variables that carry it.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use cursus_access::signals::SignalOptions;
use cursus_certificate::issuer::IssuerConfig;
use cursus_db::RetryPolicy;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Caller authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Transaction and signal-processing settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Certificate settings.
    #[serde(default)]
    pub certificates: CertificateConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Database file name inside the data directory.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the session-token secret.
    #[serde(default = "default_session_secret_env")]
    pub session_secret_env: String,
    /// Environment variable holding the payment-webhook secret.
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: String,
    /// Tolerated clock skew when checking token expiry.
    #[serde(default = "default_clock_leeway")]
    pub clock_leeway_secs: u64,
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Attempts per transaction before a conflict is surfaced.
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: u32,
    /// Base backoff between attempts, in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
    /// Age after which an unfinished payment signal may be reclaimed.
    #[serde(default = "default_signal_stale_after")]
    pub signal_stale_after_secs: u64,
}

/// Certificate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Verification code prefix.
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

// Default value functions

fn default_db_file() -> String {
    "cursus.db".to_string()
}

fn default_session_secret_env() -> String {
    "CURSUS_SESSION_SECRET".to_string()
}

fn default_webhook_secret_env() -> String {
    "CURSUS_WEBHOOK_SECRET".to_string()
}

fn default_clock_leeway() -> u64 {
    30
}

fn default_transaction_attempts() -> u32 {
    5
}

fn default_retry_backoff() -> u64 {
    20
}

fn default_busy_timeout() -> u32 {
    cursus_db::DEFAULT_BUSY_TIMEOUT_MS
}

fn default_signal_stale_after() -> u64 {
    300
}

fn default_code_prefix() -> String {
    "CRS".to_string()
}

fn default_max_code_attempts() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            db_file: default_db_file(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret_env: default_session_secret_env(),
            webhook_secret_env: default_webhook_secret_env(),
            clock_leeway_secs: default_clock_leeway(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            transaction_attempts: default_transaction_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            busy_timeout_ms: default_busy_timeout(),
            signal_stale_after_secs: default_signal_stale_after(),
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            code_prefix: default_code_prefix(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

/// Secret material read from the environment. Wiped on drop.
pub struct Secrets {
    pub session: Zeroizing<String>,
    pub webhook: Zeroizing<String>,
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Read the session and webhook secrets named in `[auth]`.
    pub fn load_secrets(&self) -> anyhow::Result<Secrets> {
        Ok(Secrets {
            session: read_secret(&self.auth.session_secret_env)?,
            webhook: read_secret(&self.auth.webhook_secret_env)?,
        })
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.ledger.transaction_attempts,
            backoff: Duration::from_millis(self.ledger.retry_backoff_ms),
        }
    }

    pub fn signal_options(&self) -> SignalOptions {
        SignalOptions {
            retry: self.retry_policy(),
            stale_after_secs: self.ledger.signal_stale_after_secs,
        }
    }

    pub fn issuer_config(&self) -> IssuerConfig {
        IssuerConfig {
            code_prefix: self.certificates.code_prefix.clone(),
            retry: self.retry_policy(),
            max_code_attempts: self.certificates.max_code_attempts,
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Default data directory: `$CURSUS_DATA_DIR`, else `~/.cursus`.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("CURSUS_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".cursus"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/cursus"))
    }
}

fn read_secret(var: &str) -> anyhow::Result<Zeroizing<String>> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value)),
        _ => anyhow::bail!("environment variable {var} must hold the secret"),
    }
}
