//! User authentication and session core.
//!
//! Provides:
//! - User registration with username/password (PBKDF2-HMAC-SHA256 + per-user salt)
//! - Signed session tokens (HS256 JWT, 1 hour by default)
//! - Logout via a digest-keyed revocation list with TTL
//! - The auth guard every protected operation goes through
//!
//! ## Design Decisions
//! - Tokens are self-contained; validation needs no database round-trip
//!   except the revocation lookup.
//! - Revocation markers are keyed by the SHA-256 of the token, so the cache
//!   never holds a replayable credential.
//! - Bad credentials, bad tokens and revoked tokens are indistinguishable to
//!   callers.

pub mod guard;
pub mod revocation;
pub mod store;
pub mod token;

pub use guard::{AuthGuard, Principal};
pub use revocation::{
    MemoryRevocationBackend, RevocationBackend, RevocationCache, SqliteRevocationBackend,
};
pub use store::{CredentialStore, PasswordPolicy, User};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer};
