use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use chrono::Utc;

use medi_core::AppError;
use medi_core::models::{compute_hash, new_session_token};

use crate::auth::{AuthUser, authenticate, clear_session_cookie, session_cookie};
use crate::dto::{CreateSessionRequest, SessionResponse, UserResponse};
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/v1/auth/session",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created; token also set as the medi_session cookie", body = SessionResponse),
        (status = 400, description = "Missing id_token", body = crate::dto::ErrorResponse),
        (status = 401, description = "Identity token rejected", body = crate::dto::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id_token = body.id_token.trim();
    if id_token.is_empty() {
        return Err(AppError::Validation("id_token is required".into()).into());
    }

    let identity = state.verifier.verify(id_token).await?;
    let users = state.db.user_repo();
    let user = users.upsert_identity(&identity).await?;

    let token = new_session_token();
    let expires_at = Utc::now() + state.session_ttl;
    users
        .create_session(user.id, &compute_hash(&token), expires_at)
        .await?;

    tracing::info!(user_id = %user.id, "Session created");

    let cookie = session_cookie(&token, state.session_ttl.num_seconds(), state.cookie_secure);
    let response = SessionResponse {
        token,
        expires_at,
        user: user.into(),
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        axum::Json(response),
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/auth/session",
    responses(
        (status = 204, description = "Session revoked and cookie cleared"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&state, &headers).await?;

    if let Some(hash) = &auth.session_hash {
        state.db.user_repo().delete_session(hash).await?;
        tracing::info!(user_id = %auth.user.id, "Session revoked");
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(state.cookie_secure))],
    ))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(Extension(auth): Extension<AuthUser>) -> impl IntoResponse {
    axum::Json(UserResponse::from(auth.user))
}
