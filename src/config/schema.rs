use crate::auth::revocation::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::auth::store::{DEFAULT_HASH_ROUNDS, DEFAULT_MIN_PASSWORD_LEN};
use crate::auth::token::DEFAULT_TOKEN_TTL_SECS;
use crate::db::DEFAULT_POOL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default gateway port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default request timeout (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum request body size (64 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 65_536;

/// Top-level `config.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub revocation: RevocationConfig,
}

// ── [gateway] ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

// ── [storage] ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: super::data_dir().join("contactd.db"),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// ── [auth] ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_secs: u64,
    /// HMAC signing secret. When unset a random one is generated at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    pub password_hash_rounds: u32,
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            token_secret: None,
            password_hash_rounds: DEFAULT_HASH_ROUNDS,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("password_hash_rounds", &self.password_hash_rounds)
            .field("min_password_len", &self.min_password_len)
            .finish()
    }
}

// ── [revocation] ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationBackendKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevocationConfig {
    pub backend: RevocationBackendKind,
    pub sweep_interval_secs: u64,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            backend: RevocationBackendKind::Memory,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}
