//! Error taxonomy shared by the stores, the auth guard and the gateway.
//!
//! Every variant maps to exactly one HTTP status. Authentication failures
//! collapse into a single [`AppError::Unauthenticated`] and missing vs.
//! foreign-owned resources into a single [`AppError::NotFound`], so callers
//! can never tell which check rejected them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result alias for core operations.
pub type AppResult<T> = Result<T, AppError>;

/// A single violated input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Collected field violations for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<_> = self.fields().collect();
        write!(f, "{}", fields.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input (400).
    #[error("Dados inválidos: {0}")]
    Validation(ValidationErrors),

    /// Unique-constraint violation (400).
    #[error("{0}")]
    Duplicate(String),

    /// Missing, invalid, expired or revoked token, or bad credentials (401).
    #[error("Não autenticado.")]
    Unauthenticated,

    /// Missing or foreign-owned resource (404).
    #[error("Recurso não encontrado.")]
    NotFound,

    /// Storage or cache failure (500). The message is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        Self::Validation(errors)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Duplicate(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(format!("sqlite: {e}"))
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        Self::Internal(format!("connection pool: {e}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "success": false,
                "error": self.to_string(),
                "details": errors,
            }),
            Self::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                serde_json::json!({
                    "success": false,
                    "error": "Erro interno do servidor.",
                })
            }
            _ => serde_json::json!({
                "success": false,
                "error": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
