use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use medi_core::AppError;
use medi_core::models::compute_hash;
use medi_core::user::User;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "medi_session";

/// The caller resolved by [`require_user`], inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Hash of the session token, when the caller used a session rather
    /// than an identity token.
    pub session_hash: Option<String>,
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Session token from the `medi_session` cookie.
pub fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from a session token, or from an identity token
/// presented as a bearer credential.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let users = state.db.user_repo();

    if let Some(token) = bearer_token(headers) {
        let hash = compute_hash(token);
        if let Some(user) = users.find_session_user(&hash, Utc::now()).await? {
            return Ok(AuthUser {
                user,
                session_hash: Some(hash),
            });
        }

        let identity = state.verifier.verify(token).await?;
        let user = users.upsert_identity(&identity).await?;
        tracing::debug!(user_id = %user.id, "Authenticated with identity token");
        return Ok(AuthUser {
            user,
            session_hash: None,
        });
    }

    if let Some(token) = cookie_token(headers) {
        let hash = compute_hash(token);
        return match users.find_session_user(&hash, Utc::now()).await? {
            Some(user) => Ok(AuthUser {
                user,
                session_hash: Some(hash),
            }),
            None => Err(AppError::Unauthorized(
                "Session expired or revoked".into(),
            )),
        };
    }

    Err(AppError::Unauthorized(
        "Missing credentials. Expected: Bearer <token> or a medi_session cookie".into(),
    ))
}

/// Middleware that rejects unauthenticated requests with 401 and attaches
/// [`AuthUser`] to the rest.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(err) => ApiError(err).into_response(),
    }
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let secure = if secure { " Secure;" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly;{secure} SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
