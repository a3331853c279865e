//! SQLite-backed credential store.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 and a per-user random salt.
//! The stored form is self-describing (`pbkdf2-sha256$<rounds>$<salt>$<hash>`)
//! so the round count can be raised without invalidating existing rows.

use crate::db::{self, Pool};
use crate::error::{AppError, AppResult, ValidationErrors};
use rand::RngCore;
use rusqlite::OptionalExtension;
use serde::Serialize;
use sha2::Sha256;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Derived key length.
const HASH_BYTES: usize = 32;

/// Default number of PBKDF2 iterations.
pub const DEFAULT_HASH_ROUNDS: u32 = 100_000;

/// Minimum username length (characters).
pub const MIN_USERNAME_LEN: usize = 3;

/// Maximum username length (characters).
pub const MAX_USERNAME_LEN: usize = 64;

/// Default minimum password length (characters).
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

const HASH_SCHEME: &str = "pbkdf2-sha256";

/// A registered user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: i64,
}

/// Password policy knobs, taken from `[auth]` config.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub hash_rounds: u32,
    pub min_password_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            hash_rounds: DEFAULT_HASH_ROUNDS,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    pool: Pool,
    policy: PasswordPolicy,
}

impl CredentialStore {
    pub fn new(pool: Pool, policy: PasswordPolicy) -> Self {
        Self { pool, policy }
    }

    // ── User Management ─────────────────────────────────────────────

    /// Register a new user. Returns the new user ID.
    ///
    /// Input is validated before any write; uniqueness comes from the
    /// `UNIQUE` constraint so concurrent duplicates cannot both succeed.
    pub async fn register(&self, username: &str, password: Option<&str>) -> AppResult<i64> {
        let mut errors = ValidationErrors::new();
        let username_len = username.chars().count();
        if username_len < MIN_USERNAME_LEN {
            errors.push(
                "username",
                format!("O username deve ter pelo menos {MIN_USERNAME_LEN} caracteres."),
            );
        } else if username_len > MAX_USERNAME_LEN {
            errors.push(
                "username",
                format!("O username deve ter no máximo {MAX_USERNAME_LEN} caracteres."),
            );
        }
        match password {
            None | Some("") => errors.push("password", "A senha é obrigatória."),
            Some(p) if p.chars().count() < self.policy.min_password_len => errors.push(
                "password",
                format!(
                    "A senha deve ter pelo menos {} caracteres.",
                    self.policy.min_password_len
                ),
            ),
            Some(_) => {}
        }
        errors.into_result()?;

        let username = username.to_owned();
        let password = password.unwrap_or_default().to_owned();
        let rounds = self.policy.hash_rounds;

        let user_id = db::with_conn(&self.pool, move |conn| {
            let password_hash = hash_password(&password, &generate_salt(), rounds);
            let result = conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, password_hash, db::epoch_secs()],
            );
            match result {
                Ok(_) => Ok(conn.last_insert_rowid()),
                Err(e) if db::is_constraint_violation(&e) => Err(AppError::Duplicate(format!(
                    "O username '{username}' já está em uso."
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await?;

        tracing::info!(user_id, "User registered");
        Ok(user_id)
    }

    /// Authenticate a user by username + password.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    pub async fn verify(&self, username: &str, password: &str) -> AppResult<User> {
        let username = username.to_owned();
        let password = password.to_owned();
        let rounds = self.policy.hash_rounds;

        db::with_conn(&self.pool, move |conn| {
            let row: Option<(i64, String, i64)> = conn
                .query_row(
                    "SELECT id, password_hash, created_at FROM users WHERE username = ?1",
                    rusqlite::params![username],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            match row {
                Some((id, stored, created_at)) => {
                    if !verify_password(&password, &stored) {
                        tracing::debug!(user_id = id, "Password mismatch");
                        return Err(AppError::Unauthenticated);
                    }
                    Ok(User {
                        id,
                        username,
                        created_at,
                    })
                }
                None => {
                    // Perform dummy hash to prevent timing side-channel
                    let _ = hash_password(&password, "00000000000000000000000000000000", rounds);
                    Err(AppError::Unauthenticated)
                }
            }
        })
        .await
    }

    #[cfg(test)]
    async fn user_count(&self) -> AppResult<u64> {
        db::with_conn(&self.pool, |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

// ── Cryptographic Helpers ───────────────────────────────────────────

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password into its stored form.
fn hash_password(password: &str, salt: &str, rounds: u32) -> String {
    let mut key = [0u8; HASH_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut key);
    format!("{HASH_SCHEME}${rounds}${salt}${}", hex::encode(key))
}

/// Check a password attempt against a stored hash.
fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(rounds), Some(salt), Some(_)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let attempt = hash_password(password, salt, rounds);
    constant_time_eq(stored.as_bytes(), attempt.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Low round count keeps test suites fast; the scheme is identical.
#[cfg(test)]
pub(crate) const TEST_POLICY: PasswordPolicy = PasswordPolicy {
    hash_rounds: 1_000,
    min_password_len: DEFAULT_MIN_PASSWORD_LEN,
};

// ── Tests ───────────────────────────────────────────────────────────
