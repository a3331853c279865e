//! Token revocation (logout blacklist).
//!
//! Revoked tokens are recorded under `blacklist:jwt:<sha256-hex>` with the
//! value `"true"`; the raw bearer token is never stored. Each marker lives
//! exactly as long as the token it blocks could still have been accepted, and
//! expiry is owned by the backend:
//! - [`MemoryRevocationBackend`]: TTL-tracked in-process map, expired entries
//!   read as absent and its own background sweeper reclaims them;
//! - [`SqliteRevocationBackend`]: `revoked_tokens` table filtered by
//!   `expires_at` on read, swept opportunistically on write.

use crate::db::{self, Pool};
use crate::error::AppResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key prefix for revocation markers.
pub const KEY_PREFIX: &str = "blacklist:jwt:";

/// Marker value stored for every revoked token.
pub const MARKER_VALUE: &str = "true";

/// Default interval between sweeps of the in-memory backend.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

/// Key-value substrate with per-entry TTL.
#[async_trait]
pub trait RevocationBackend: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Store `value` under `key`, replacing any existing entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Fetch a live entry. Expired entries read as absent.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
}

/// Digest-keyed revocation list over a [`RevocationBackend`].
#[derive(Clone)]
pub struct RevocationCache {
    backend: Arc<dyn RevocationBackend>,
}

impl RevocationCache {
    pub fn new(backend: Arc<dyn RevocationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Revoke `token`, whose claims expire at `expires_at` (unix seconds).
    ///
    /// Already-expired tokens are unusable anyway, so nothing is written.
    /// Revoking twice just rewrites the same marker.
    pub async fn revoke(&self, token: &str, expires_at: i64) -> AppResult<()> {
        self.revoke_at(token, expires_at, db::epoch_secs()).await
    }

    pub async fn revoke_at(&self, token: &str, expires_at: i64, now: i64) -> AppResult<()> {
        let Some(ttl) = remaining_ttl(expires_at, now) else {
            tracing::debug!("Skipping revocation of an already expired token");
            return Ok(());
        };
        let key = revocation_key(token);
        self.backend.set(&key, MARKER_VALUE, ttl).await?;
        tracing::debug!(
            key_prefix = &key[..KEY_PREFIX.len() + 8],
            ttl_secs = ttl.as_secs(),
            "Token revoked"
        );
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        Ok(self.backend.get(&revocation_key(token)).await?.is_some())
    }

    /// Raw marker lookup by key.
    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.backend.get(key).await
    }
}

/// SHA-256 digest of a token, hex-encoded.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cache key for a token's revocation marker.
pub fn revocation_key(token: &str) -> String {
    format!("{KEY_PREFIX}{}", token_digest(token))
}

/// Marker lifetime for a token expiring at `expires_at`.
///
/// `exp` is inclusive at second granularity (a token is accepted while
/// `now <= exp`), so the marker must outlive the whole final second.
fn remaining_ttl(expires_at: i64, now: i64) -> Option<Duration> {
    if now > expires_at {
        return None;
    }
    let secs = expires_at.saturating_sub(now).saturating_add(1);
    Some(Duration::from_secs(secs.unsigned_abs()))
}

// ── In-memory backend ───────────────────────────────────────────────

struct MemorySlot {
    value: String,
    expires_at: Instant,
}

/// In-process TTL map. Revocations are lost on restart.
#[derive(Default)]
pub struct MemoryRevocationBackend {
    slots: Mutex<HashMap<String, MemorySlot>>,
}

impl MemoryRevocationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count live and not-yet-swept entries (for diagnostics).
    pub fn entry_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn sweep_now(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.expires_at > now);
        before - slots.len()
    }

    /// Spawn the periodic sweeper. The caller owns the handle and aborts it
    /// on shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep_now();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired revocation entries");
                }
            }
        })
    }
}

#[async_trait]
impl RevocationBackend for MemoryRevocationBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let expires_at = Instant::now() + ttl;
        self.slots.lock().insert(
            key.to_owned(),
            MemorySlot {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let live = slots
            .get(key)
            .map(|slot| (slot.expires_at > now, slot.value.clone()));
        match live {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

// ── SQLite backend ──────────────────────────────────────────────────

/// Revocations persisted in the `revoked_tokens` table; survive restarts.
#[derive(Clone)]
pub struct SqliteRevocationBackend {
    pool: Pool,
}

impl SqliteRevocationBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationBackend for SqliteRevocationBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let key = key.to_owned();
        let value = value.to_owned();
        db::with_conn(&self.pool, move |conn| {
            let now = db::epoch_secs();
            let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            let expires_at = now.saturating_add(ttl_secs);
            // Cleanup expired markers
            conn.execute(
                "DELETE FROM revoked_tokens WHERE expires_at < ?1",
                rusqlite::params![now],
            )?;
            conn.execute(
                "INSERT INTO revoked_tokens (token_key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(token_key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = MAX(revoked_tokens.expires_at, excluded.expires_at)",
                rusqlite::params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        use rusqlite::OptionalExtension;

        let key = key.to_owned();
        db::with_conn(&self.pool, move |conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM revoked_tokens WHERE token_key = ?1 AND expires_at >= ?2",
                    rusqlite::params![key, db::epoch_secs()],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }
}
