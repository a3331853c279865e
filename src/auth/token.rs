//! Signed session tokens.
//!
//! Tokens are HS256 compact JWTs (`header.claims.signature`, base64url without
//! padding) signed with HMAC-SHA256 over a process-wide secret. Each token
//! carries a random `jti`, so two tokens issued for the same user in the same
//! second still differ.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: 1 hour (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Secrets shorter than this trigger a startup warning.
pub const RECOMMENDED_SECRET_BYTES: usize = 32;

const JTI_BYTES: usize = 16;

/// Precomputed `{"alg":"HS256","typ":"JWT"}` header segment.
const HEADER_SEGMENT: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: i64,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Random nonce.
    pub jti: String,
}

/// A freshly issued token with its decoded claims.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<[u8]>,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Build an issuer with a random secret. Tokens do not survive a restart.
    pub fn with_random_secret(ttl_secs: u64) -> Self {
        Self::new(generate_secret(), ttl_secs)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, user_id: i64) -> IssuedToken {
        self.issue_at(user_id, crate::db::epoch_secs())
    }

    pub fn issue_at(&self, user_id: i64, now: i64) -> IssuedToken {
        let mut jti = [0u8; JTI_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut jti);

        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            jti: hex::encode(jti),
        };
        // Claims is a plain struct of integers and a hex string.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!("{HEADER_SEGMENT}.{}", URL_SAFE_NO_PAD.encode(payload));
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        IssuedToken {
            token: format!("{signing_input}.{signature}"),
            claims,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, crate::db::epoch_secs())
    }

    /// Check structure, then signature, then expiry.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };
        if header != HEADER_SEGMENT {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let signing_input_len = header.len() + 1 + payload.len();
        let mut mac = self.mac();
        mac.update(&token.as_bytes()[..signing_input_len]);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if now > claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
        }
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Generate a random signing secret (hex-encoded, 32 bytes of entropy).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; RECOMMENDED_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret-that-is-long-enough-for-hs256", 3600)
    }

    #[test]
    fn header_segment_matches_hs256_header() {
        let decoded = URL_SAFE_NO_PAD.decode(HEADER_SEGMENT).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let issuer = issuer();
        let issued = issuer.issue_at(42, NOW);
        assert_eq!(issued.claims.sub, 42);
        assert_eq!(issued.claims.iat, NOW);
        assert_eq!(issued.claims.exp, NOW + 3600);

        let claims = issuer.verify_at(&issued.token, NOW + 10).unwrap();
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn repeated_issuance_yields_distinct_tokens() {
        let issuer = issuer();
        let a = issuer.issue_at(1, NOW);
        let b = issuer.issue_at(1, NOW);
        assert_ne!(a.token, b.token);
        assert!(issuer.verify_at(&a.token, NOW).is_ok());
        assert!(issuer.verify_at(&b.token, NOW).is_ok());
    }

    #[test]
    fn token_is_valid_until_exp_inclusive() {
        let issuer = issuer();
        let issued = issuer.issue_at(1, NOW);
        assert!(issuer.verify_at(&issued.token, NOW + 3600).is_ok());
        assert_eq!(
            issuer.verify_at(&issued.token, NOW + 3601),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_claims_fail_signature() {
        let issuer = issuer();
        let issued = issuer.issue_at(1, NOW);
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_claims = Claims {
            sub: 2,
            ..issued.claims.clone()
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            issuer.verify_at(&forged, NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_signature_fails() {
        let issuer = issuer();
        let issued = issuer.issue_at(1, NOW);
        let mut forged = issued.token.clone();
        let last = forged.pop().unwrap();
        forged.push(if last == 'A' { 'B' } else { 'A' });
        assert!(issuer.verify_at(&forged, NOW).is_err());
    }

    #[test]
    fn other_secret_fails_signature() {
        let issued = issuer().issue_at(1, NOW);
        let other = TokenIssuer::new("a-completely-different-signing-secret", 3600);
        assert_eq!(
            other.verify_at(&issued.token, NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let issuer = issuer();
        let bad_payload = format!("{HEADER_SEGMENT}.!!!.sig");
        for token in [
            "",
            "abc",
            "a.b",
            "a.b.c.d",
            "eyJhbGciOiJub25lIn0.e30.",
            bad_payload.as_str(),
        ] {
            assert!(issuer.verify_at(token, NOW).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn token_errors_are_plain_values() {
        let err = issuer().verify_at("a.b", NOW).unwrap_err();
        let copied = err;
        assert_eq!(err, TokenError::Malformed);
        assert_eq!(copied, err);
    }

    #[test]
    fn generated_secrets_are_random() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), RECOMMENDED_SECRET_BYTES * 2);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_output_redacts_token() {
        let issued = issuer().issue_at(1, NOW);
        let rendered = format!("{issued:?}");
        assert!(!rendered.contains(&issued.token));
        assert!(rendered.contains("redacted"));
    }
}
