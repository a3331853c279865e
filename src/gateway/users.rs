//! Registration, login and logout handlers.

use super::{invalid_body, respond, ApiResult, AppState, AuthUser};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

/// Body for `POST /users` and `POST /users/login`.
#[derive(Deserialize)]
pub(super) struct CredentialsBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// POST /users: create a new account.
pub(super) async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body.map_err(invalid_body)?;

    let user_id = state
        .credentials
        .register(
            body.username.as_deref().unwrap_or_default(),
            body.password.as_deref(),
        )
        .await?;

    Ok(respond(
        StatusCode::CREATED,
        serde_json::json!({
            "message": "Usuário criado com sucesso.",
            "user_id": user_id,
        }),
    ))
}

/// POST /users/login: verify credentials and issue a session token.
pub(super) async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body.map_err(invalid_body)?;

    let user = state
        .credentials
        .verify(
            body.username.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;
    let issued = state.guard.issuer().issue(user.id);
    tracing::info!(user_id = user.id, "User logged in");

    Ok(respond(
        StatusCode::OK,
        serde_json::json!({
            "token": issued.token,
            "expires_at": issued.claims.exp,
            "user": user,
        }),
    ))
}

/// POST /users/logout: revoke the presented token.
pub(super) async fn handle_logout(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult {
    state
        .guard
        .revocations()
        .revoke(principal.token(), principal.expires_at)
        .await?;
    tracing::info!(user_id = principal.user_id, "User logged out");

    Ok(respond(
        StatusCode::OK,
        serde_json::json!({ "message": "Logout realizado com sucesso." }),
    ))
}
