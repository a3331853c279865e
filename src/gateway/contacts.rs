//! Contact CRUD handlers. The owner always comes from [`AuthUser`].

use super::{invalid_body, respond, ApiResult, AppState, AuthUser};
use crate::contacts::{ContactPatch, NewContact};
use crate::error::AppError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
};

/// A non-numeric id cannot name any contact.
fn contact_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound)
}

/// GET /contacts
pub(super) async fn handle_list(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult {
    let contacts = state.contacts.list(principal.user_id).await?;
    Ok(respond(StatusCode::OK, contacts))
}

/// POST /contacts
pub(super) async fn handle_create(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    body: Result<Json<NewContact>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body.map_err(invalid_body)?;
    let contact = state.contacts.create(principal.user_id, input).await?;
    Ok(respond(
        StatusCode::CREATED,
        serde_json::json!({ "contact": contact }),
    ))
}

/// GET /contacts/{id}
pub(super) async fn handle_get(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult {
    let id = contact_id(path)?;
    let contact = state.contacts.get(principal.user_id, id).await?;
    Ok(respond(StatusCode::OK, serde_json::json!({ "contact": contact })))
}

/// PUT /contacts/{id}
pub(super) async fn handle_update(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ContactPatch>, JsonRejection>,
) -> ApiResult {
    let id = contact_id(path)?;
    let Json(patch) = body.map_err(invalid_body)?;
    let contact = state.contacts.update(principal.user_id, id, patch).await?;
    Ok(respond(StatusCode::OK, serde_json::json!({ "contact": contact })))
}

/// DELETE /contacts/{id}
pub(super) async fn handle_delete(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult {
    let id = contact_id(path)?;
    state.contacts.delete(principal.user_id, id).await?;
    Ok(respond(
        StatusCode::OK,
        serde_json::json!({ "message": "Contato removido com sucesso." }),
    ))
}
