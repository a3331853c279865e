//! SQLite connection pool and schema.
//!
//! Tables:
//! - `users`: id, username (UNIQUE, case-sensitive), password_hash, created_at
//! - `contacts`: id, user_id -> users.id, name, phone, created_at, updated_at
//! - `revoked_tokens`: token_key, expires_at (only used by the SQLite revocation backend)

use crate::error::{AppError, AppResult};
use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 8;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contacts_user ON contacts(user_id);

CREATE TABLE IF NOT EXISTS revoked_tokens (
    token_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expires ON revoked_tokens(expires_at);
";

/// Open (or create) the database at `db_path` and apply the schema.
pub fn open_pool(db_path: &Path, max_size: u32) -> Result<Pool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database dir: {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
    });
    let pool = r2d2::Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let conn = pool.get().context("Failed to acquire database connection")?;
    // WAL mode for concurrent reads + crash safety
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch(SCHEMA)
        .context("Failed to apply database schema")?;

    tracing::info!(path = %db_path.display(), max_size, "Database pool ready");
    Ok(pool)
}

/// Run a closure against a pooled connection on the blocking thread pool.
///
/// SQLite calls block, so they must never run on a runtime worker thread.
pub async fn with_conn<T, F>(pool: &Pool, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PooledConnection) -> AppResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(AppError::from)?;
        f(&mut conn)
    })
    .await?
}

/// Whether a rusqlite error is a UNIQUE / constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) fn test_pool() -> (tempfile::TempDir, Pool) {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = open_pool(&tmp.path().join("contactd.db"), 4).unwrap();
    (tmp, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("db.sqlite");
        let first = open_pool(&path, 2).unwrap();
        drop(first);
        let second = open_pool(&path, 2).unwrap();
        let conn = second.get().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'contacts', 'revoked_tokens')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        let err = conn
            .execute(
                "INSERT INTO contacts (user_id, name, phone, created_at, updated_at)
                 VALUES (999, 'Ghost', '11987654321', 0, 0)",
                [],
            )
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn every_pooled_connection_gets_pragmas() {
        let (_tmp, pool) = test_pool();
        let conns: Vec<_> = (0..3).map(|_| pool.get().unwrap()).collect();
        for conn in &conns {
            let synchronous: i64 = conn
                .query_row("PRAGMA synchronous", [], |row| row.get(0))
                .unwrap();
            let foreign_keys: i64 = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert_eq!(synchronous, 1, "NORMAL");
            assert_eq!(foreign_keys, 1);
        }
    }

    #[tokio::test]
    async fn with_conn_runs_off_the_runtime() {
        let (_tmp, pool) = test_pool();
        let one: i64 = with_conn(&pool, |conn| {
            Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(one, 1);
    }
}
