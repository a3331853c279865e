//! The single choke point for protected operations.
//!
//! Checks run in a fixed order and stop at the first failure:
//! header → signature/structure → expiry → revocation. Every rejection maps to
//! the same [`AppError::Unauthenticated`]; the actual cause only reaches the
//! debug log.

use super::revocation::RevocationCache;
use super::token::{TokenError, TokenIssuer};
use crate::error::{AppError, AppResult};

/// An authenticated caller.
#[derive(Clone)]
pub struct Principal {
    pub user_id: i64,
    /// Token expiry (unix seconds), needed to size the revocation marker.
    pub expires_at: i64,
    token: String,
}

impl Principal {
    /// The bearer token this principal was resolved from.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Why a request was rejected. Internal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingHeader,
    MalformedHeader,
    Token(TokenError),
    Revoked,
}

#[derive(Clone)]
pub struct AuthGuard {
    issuer: TokenIssuer,
    revocations: RevocationCache,
}

impl AuthGuard {
    pub fn new(issuer: TokenIssuer, revocations: RevocationCache) -> Self {
        Self {
            issuer,
            revocations,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn revocations(&self) -> &RevocationCache {
        &self.revocations
    }

    /// Resolve a raw `Authorization` header value to a principal.
    pub async fn authenticate(&self, authorization: Option<&str>) -> AppResult<Principal> {
        match self.check(authorization).await? {
            Ok(principal) => Ok(principal),
            Err(rejection) => {
                tracing::debug!(?rejection, "Rejected bearer token");
                Err(AppError::Unauthenticated)
            }
        }
    }

    /// Outer error: the revocation backend failed. Inner error: rejection.
    async fn check(&self, authorization: Option<&str>) -> AppResult<Result<Principal, Rejection>> {
        let Some(header) = authorization else {
            return Ok(Err(Rejection::MissingHeader));
        };
        let Some(token) = extract_bearer_token(header) else {
            return Ok(Err(Rejection::MalformedHeader));
        };

        let claims = match self.issuer.verify(token) {
            Ok(claims) => claims,
            Err(e) => return Ok(Err(Rejection::Token(e))),
        };

        if self.revocations.is_revoked(token).await? {
            return Ok(Err(Rejection::Revoked));
        }

        Ok(Ok(Principal {
            user_id: claims.sub,
            expires_at: claims.exp,
            token: token.to_owned(),
        }))
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::MemoryRevocationBackend;
    use crate::db;
    use std::sync::Arc;

    fn guard() -> AuthGuard {
        AuthGuard::new(
            TokenIssuer::new("guard-test-secret-guard-test-secret", 3600),
            RevocationCache::new(Arc::new(MemoryRevocationBackend::new())),
        )
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let guard = guard();
        let issued = guard.issuer().issue(7);
        let header = format!("Bearer {}", issued.token);

        let principal = guard.authenticate(Some(&header)).await.unwrap();
        assert_eq!(principal.user_id, 7);
        assert_eq!(principal.expires_at, issued.claims.exp);
        assert_eq!(principal.token(), issued.token);
    }

    #[tokio::test]
    async fn every_rejection_is_uniform() {
        let guard = guard();
        let now = db::epoch_secs();

        let expired = guard.issuer().issue_at(1, now - 7200).token;
        let forged = TokenIssuer::new("some-other-secret-some-other-secret", 3600)
            .issue(1)
            .token;
        let revoked = guard.issuer().issue(1);
        guard
            .revocations()
            .revoke(&revoked.token, revoked.claims.exp)
            .await
            .unwrap();

        let cases = [
            None,
            Some("Token abc".to_string()),
            Some("Bearer not-a-token".to_string()),
            Some(format!("Bearer {forged}")),
            Some(format!("Bearer {expired}")),
            Some(format!("Bearer {}", revoked.token)),
        ];
        for header in cases {
            let err = guard.authenticate(header.as_deref()).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthenticated), "{header:?}");
            assert_eq!(err.to_string(), AppError::Unauthenticated.to_string());
        }
    }

    #[tokio::test]
    async fn checks_run_in_order() {
        let guard = guard();
        let now = db::epoch_secs();

        assert_eq!(
            guard.check(None).await.unwrap().unwrap_err(),
            Rejection::MissingHeader
        );
        assert_eq!(
            guard.check(Some("Bearer")).await.unwrap().unwrap_err(),
            Rejection::MalformedHeader
        );

        // Expired and revoked: expiry is reported first.
        let expired = guard.issuer().issue_at(1, now - 7200);
        guard
            .revocations()
            .revoke_at(&expired.token, now + 60, now)
            .await
            .unwrap();
        let header = format!("Bearer {}", expired.token);
        assert_eq!(
            guard.check(Some(&header)).await.unwrap().unwrap_err(),
            Rejection::Token(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_despite_valid_signature() {
        let guard = guard();
        let issued = guard.issuer().issue(3);
        let header = format!("Bearer {}", issued.token);

        assert!(guard.authenticate(Some(&header)).await.is_ok());
        guard
            .revocations()
            .revoke(&issued.token, issued.claims.exp)
            .await
            .unwrap();
        assert_eq!(
            guard.check(Some(&header)).await.unwrap().unwrap_err(),
            Rejection::Revoked
        );

        // A second token for the same user is unaffected.
        let other = guard.issuer().issue(3);
        let header = format!("Bearer {}", other.token);
        assert!(guard.authenticate(Some(&header)).await.is_ok());
    }

    #[test]
    fn principal_debug_hides_token() {
        let principal = Principal {
            user_id: 1,
            expires_at: 2,
            token: "secret.token.value".into(),
        };
        assert!(!format!("{principal:?}").contains("secret.token.value"));
    }
}
