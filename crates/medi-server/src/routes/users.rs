use std::sync::Arc;

use axum::Extension;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;

use medi_core::gamification::ProgressEvent;
use medi_core::models::clamp_limit;
use medi_core::user::ProfileUpdate;

use crate::auth::AuthUser;
use crate::dto::{
    ActivityListResponse, ActivityResponse, AwardXpRequest, LeaderboardResponse, LimitQuery,
    ProgressResponse, ProgressUpdateResponse, StatsResponse, StudyTimeRequest,
    UpdateProfileRequest, UserResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_me(Extension(auth): Extension<AuthUser>) -> impl IntoResponse {
    axum::Json(UserResponse::from(auth.user))
}

#[utoipa::path(
    patch,
    path = "/v1/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Invalid profile", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = ProfileUpdate::from(body);
    update.validate()?;
    let user = state.db.user_repo().update_profile(auth.user.id, &update).await?;
    Ok(axum::Json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/v1/users/me/progress",
    responses(
        (status = 200, description = "XP, level, streak, and achievements", body = ProgressResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let achievements = state.db.user_repo().list_achievements(auth.user.id).await?;
    Ok(axum::Json(ProgressResponse::new(&auth.user, achievements)))
}

#[utoipa::path(
    post,
    path = "/v1/users/me/xp",
    request_body = AwardXpRequest,
    responses(
        (status = 200, description = "XP awarded", body = ProgressUpdateResponse),
        (status = 400, description = "Amount out of range", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn award_xp(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<AwardXpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = ProgressEvent::manual(body.amount, body.reason.unwrap_or_default())?;
    let outcome = state
        .db
        .user_repo()
        .record_progress(auth.user.id, &event, Utc::now().date_naive())
        .await?;
    state.stats.invalidate(auth.user.id).await;

    Ok(axum::Json(ProgressUpdateResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/v1/users/me/study-time",
    request_body = StudyTimeRequest,
    responses(
        (status = 200, description = "Study time recorded", body = ProgressUpdateResponse),
        (status = 400, description = "Minutes out of range", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn record_study_time(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<StudyTimeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = ProgressEvent::study_time(body.minutes)?;
    let outcome = state
        .db
        .user_repo()
        .record_progress(auth.user.id, &event, Utc::now().date_naive())
        .await?;
    state.stats.invalidate(auth.user.id).await;

    Ok(axum::Json(ProgressUpdateResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/v1/users/me/activity",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent activity, newest first", body = ActivityListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let activities = state
        .db
        .user_repo()
        .list_activity(auth.user.id, clamp_limit(query.limit))
        .await?;
    let count = activities.len();

    Ok(axum::Json(ActivityListResponse {
        activities: activities.into_iter().map(ActivityResponse::from).collect(),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/me/stats",
    responses(
        (status = 200, description = "Study statistics, cached for a few minutes", body = StatsResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let repo = state.db.stats_repo();
    let stats = state
        .stats
        .get_or_compute(user_id, || async move { repo.compute(user_id, Utc::now()).await })
        .await?;

    Ok(axum::Json(StatsResponse::from(stats.as_ref())))
}

#[utoipa::path(
    get,
    path = "/v1/users/leaderboard",
    params(LimitQuery),
    responses(
        (status = 200, description = "Users ranked by XP", body = LeaderboardResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .db
        .user_repo()
        .leaderboard(clamp_limit(query.limit))
        .await?;
    Ok(axum::Json(LeaderboardResponse::from(entries)))
}
