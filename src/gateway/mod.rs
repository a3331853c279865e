//! Axum HTTP gateway.
//!
//! Routes:
//! - `POST /users`, `POST /users/login`, `POST /users/logout`
//! - `GET|POST /contacts`, `GET|PUT|DELETE /contacts/{id}`
//! - `GET /health`
//!
//! Every response is an envelope: `{"success": true, "data": ...}` or
//! `{"success": false, "error": "...", "details"?: [...]}`. Request bodies are
//! capped and requests time out (see [`GatewayConfig`]).

mod contacts;
mod users;

use crate::auth::{AuthGuard, CredentialStore, Principal, RevocationCache};
use crate::auth::{MemoryRevocationBackend, SqliteRevocationBackend};
use crate::config::{AuthConfig, Config, GatewayConfig, RevocationBackendKind, RevocationConfig};
use crate::contacts::ContactStore;
use crate::db::{self, Pool};
use crate::error::AppError;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Concrete handler response (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<serde_json::Value>);
type ApiResult = Result<ApiResponse, AppError>;

fn respond(status: StatusCode, data: impl Serialize) -> ApiResponse {
    (
        status,
        Json(serde_json::json!({
            "success": true,
            "data": data,
        })),
    )
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::validation(
        "body",
        format!("Corpo da requisição inválido: {}", rejection.body_text()),
    )
}

// ── State ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub contacts: ContactStore,
    pub guard: AuthGuard,
}

impl AppState {
    pub fn new(pool: Pool, auth: &AuthConfig, revocations: RevocationCache) -> Self {
        Self {
            credentials: CredentialStore::new(pool.clone(), auth.password_policy()),
            contacts: ContactStore::new(pool),
            guard: AuthGuard::new(auth.token_issuer(), revocations),
        }
    }
}

/// Build the revocation cache selected by `[revocation] backend`.
///
/// The memory backend comes with its sweeper task; the SQLite backend prunes
/// expired rows itself on write.
pub fn build_revocations(
    config: &RevocationConfig,
    pool: &Pool,
) -> (RevocationCache, Option<JoinHandle<()>>) {
    match config.backend {
        RevocationBackendKind::Memory => {
            let backend = Arc::new(MemoryRevocationBackend::new());
            let sweeper = Arc::clone(&backend)
                .spawn_sweeper(Duration::from_secs(config.sweep_interval_secs));
            (RevocationCache::new(backend), Some(sweeper))
        }
        RevocationBackendKind::Sqlite => (
            RevocationCache::new(Arc::new(SqliteRevocationBackend::new(pool.clone()))),
            None,
        ),
    }
}

// ── Auth extractor ──────────────────────────────────────────────────

/// The authenticated caller. Every protected handler takes this first, so the
/// guard runs before any path or body parsing.
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.guard.authenticate(authorization).await.map(AuthUser)
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/users", post(users::handle_register))
        .route("/users/login", post(users::handle_login))
        .route("/users/logout", post(users::handle_logout))
        .route(
            "/contacts",
            get(contacts::handle_list).post(contacts::handle_create),
        )
        .route(
            "/contacts/{id}",
            get(contacts::handle_get)
                .put(contacts::handle_update)
                .delete(contacts::handle_delete),
        )
        .fallback(handle_not_found)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

/// GET /health: liveness check.
async fn handle_health(State(state): State<AppState>) -> ApiResponse {
    respond(
        StatusCode::OK,
        serde_json::json!({
            "status": "ok",
            "revocation_backend": state.guard.revocations().backend_name(),
        }),
    )
}

async fn handle_not_found() -> AppError {
    AppError::NotFound
}

// ── Lifecycle ───────────────────────────────────────────────────────

/// Open storage, start background tasks and serve until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let pool = db::open_pool(&config.storage.database_path, config.storage.pool_size)?;
    let (revocations, sweeper) = build_revocations(&config.revocation, &pool);
    let state = AppState::new(pool, &config.auth, revocations);
    let app = build_router(state, &config.gateway);

    let host = config.gateway.host.as_str();
    let listener = tokio::net::TcpListener::bind((host, config.gateway.port))
        .await
        .with_context(|| format!("Failed to bind {host}:{}", config.gateway.port))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        revocation_backend = ?config.revocation.backend,
        "Gateway listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
