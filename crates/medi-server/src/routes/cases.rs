use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use uuid::Uuid;

use medi_core::AppError;
use medi_core::case::{Case, CaseDraft, CaseFilter};
use medi_core::models::clamp_limit;
use medi_core::rating::validate_rating;
use medi_core::user::User;

use crate::auth::AuthUser;
use crate::dto::{
    CaseListResponse, CaseRequest, CaseResponse, ListCasesQuery, RateCaseRequest,
    RateCaseResponse, RatingResponse, RatingSummaryResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 2000;

/// Load a case the caller may see. Drafts of other authors look missing.
pub(crate) async fn load_visible_case(
    state: &AppState,
    id: Uuid,
    user: &User,
) -> Result<Case, AppError> {
    state
        .db
        .case_repo()
        .get(id)
        .await?
        .filter(|c| c.is_visible_to(user.id, user.role.is_admin()))
        .ok_or_else(|| AppError::NotFound(format!("Case {id} not found")))
}

fn ensure_can_modify(user: &User, case: &Case) -> Result<(), AppError> {
    if user.can_modify(case.author_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the author or an admin can change this case".into(),
        ))
    }
}

#[utoipa::path(
    get,
    path = "/v1/cases",
    params(ListCasesQuery),
    responses(
        (status = 200, description = "Visible cases, newest first", body = CaseListResponse),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListCasesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CaseFilter {
        difficulty: query.difficulty()?,
        specialty: query.specialty.filter(|s| !s.trim().is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit: clamp_limit(query.limit),
        offset: query.offset.unwrap_or(0),
    };

    let cases = state
        .db
        .case_repo()
        .list(&filter, auth.user.id, auth.user.role.is_admin())
        .await?;
    let count = cases.len();

    Ok(axum::Json(CaseListResponse {
        cases: cases.into_iter().map(CaseResponse::from).collect(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/cases",
    request_body = CaseRequest,
    responses(
        (status = 201, description = "Case created", body = CaseResponse),
        (status = 400, description = "Invalid case", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Only educators and admins author cases", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn create_case(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<CaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.user.role.can_author_cases() {
        return Err(AppError::Forbidden("Only educators and admins can create cases".into()).into());
    }

    let draft = CaseDraft::try_from(body)?;
    let case = state.db.case_repo().create(auth.user.id, &draft).await?;
    tracing::info!(case_id = %case.id, author_id = %auth.user.id, "Case created");

    Ok((StatusCode::CREATED, axum::Json(CaseResponse::from(case))))
}

#[utoipa::path(
    get,
    path = "/v1/cases/{id}",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case details", body = CaseResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut case = load_visible_case(&state, id, &auth.user).await?;
    state.db.case_repo().increment_views(id).await?;
    case.view_count += 1;

    Ok(axum::Json(CaseResponse::from(case)))
}

#[utoipa::path(
    put,
    path = "/v1/cases/{id}",
    params(("id" = Uuid, Path, description = "Case ID")),
    request_body = CaseRequest,
    responses(
        (status = 200, description = "Case updated", body = CaseResponse),
        (status = 400, description = "Invalid case", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the author", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn update_case(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<CaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let case = load_visible_case(&state, id, &auth.user).await?;
    ensure_can_modify(&auth.user, &case)?;

    let draft = CaseDraft::try_from(body)?;
    let updated = state
        .db
        .case_repo()
        .update(id, &draft)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Case {id} not found")))?;

    Ok(axum::Json(CaseResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/v1/cases/{id}",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 204, description = "Case deleted"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the author", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn delete_case(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let case = load_visible_case(&state, id, &auth.user).await?;
    ensure_can_modify(&auth.user, &case)?;

    state.db.case_repo().delete(id).await?;
    tracing::info!(case_id = %id, user_id = %auth.user.id, "Case deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/cases/{id}/rating",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 200, description = "The caller's rating", body = RatingResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case or rating not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn get_rating(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_visible_case(&state, id, &auth.user).await?;
    let rating = state
        .db
        .case_repo()
        .get_rating(id, auth.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have not rated this case".into()))?;

    Ok(axum::Json(RatingResponse::from(rating)))
}

#[utoipa::path(
    put,
    path = "/v1/cases/{id}/rating",
    params(("id" = Uuid, Path, description = "Case ID")),
    request_body = RateCaseRequest,
    responses(
        (status = 201, description = "First rating recorded", body = RateCaseResponse),
        (status = 200, description = "Rating changed", body = RateCaseResponse),
        (status = 400, description = "Rating outside 1-5", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn rate_case(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<RateCaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rating = validate_rating(body.rating)?;
    let comment = body
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS) {
        return Err(AppError::Validation(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        ))
        .into());
    }

    load_visible_case(&state, id, &auth.user).await?;
    let outcome = state
        .db
        .case_repo()
        .rate_case(id, auth.user.id, rating, comment, Utc::now().date_naive())
        .await?;

    if outcome.progress.is_some() {
        state.stats.invalidate(auth.user.id).await;
    }

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let response = RateCaseResponse {
        rating: outcome.rating.into(),
        summary: outcome.aggregate.into(),
    };

    Ok((status, axum::Json(response)))
}

#[utoipa::path(
    delete,
    path = "/v1/cases/{id}/rating",
    params(("id" = Uuid, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Rating removed; updated summary", body = RatingSummaryResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case or rating not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cases"
)]
pub async fn delete_rating(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_visible_case(&state, id, &auth.user).await?;
    let aggregate = state
        .db
        .case_repo()
        .remove_rating(id, auth.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("You have not rated this case".into()))?;

    Ok(axum::Json(RatingSummaryResponse::from(aggregate)))
}
