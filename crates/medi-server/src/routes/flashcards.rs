use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use uuid::Uuid;

use medi_core::AppError;
use medi_core::flashcard::{CategoryDraft, FlashcardDraft, FlashcardFilter, NewFlashcardSession};
use medi_core::gamification::ProgressEvent;
use medi_core::models::clamp_limit;
use medi_core::scheduling::Confidence;

use crate::auth::AuthUser;
use crate::dto::{
    CategoryListResponse, CategoryRequest, CategoryResponse, ConfidenceRequest,
    FlashcardListResponse, FlashcardRequest, FlashcardResponse, FlashcardSessionRequest,
    FlashcardSessionResponse, LimitQuery, ListFlashcardsQuery, RecordSessionResponse,
    SessionListResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

fn card_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Flashcard {id} not found"))
}

fn category_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Category {id} not found"))
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/flashcards",
    params(ListFlashcardsQuery),
    responses(
        (status = 200, description = "The caller's flashcards", body = FlashcardListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn list_flashcards(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListFlashcardsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = FlashcardFilter {
        category_id: query.category_id,
        due_only: query.due,
        limit: clamp_limit(query.limit),
    };
    let cards = state
        .db
        .flashcard_repo()
        .list(auth.user.id, &filter, Utc::now())
        .await?;
    let count = cards.len();

    Ok(axum::Json(FlashcardListResponse {
        flashcards: cards.into_iter().map(FlashcardResponse::from).collect(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/flashcards",
    request_body = FlashcardRequest,
    responses(
        (status = 201, description = "Flashcard created", body = FlashcardResponse),
        (status = 400, description = "Invalid card or unknown category", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn create_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<FlashcardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = FlashcardDraft::try_from(body)?;
    let card = state.db.flashcard_repo().create(auth.user.id, &draft).await?;
    state.stats.invalidate(auth.user.id).await;

    Ok((StatusCode::CREATED, axum::Json(FlashcardResponse::from(card))))
}

#[utoipa::path(
    get,
    path = "/v1/flashcards/{id}",
    params(("id" = Uuid, Path, description = "Flashcard ID")),
    responses(
        (status = 200, description = "Flashcard", body = FlashcardResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Flashcard not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn get_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .db
        .flashcard_repo()
        .get(id)
        .await?
        .filter(|c| c.owner_id == auth.user.id)
        .ok_or_else(|| card_not_found(id))?;

    Ok(axum::Json(FlashcardResponse::from(card)))
}

#[utoipa::path(
    put,
    path = "/v1/flashcards/{id}",
    params(("id" = Uuid, Path, description = "Flashcard ID")),
    request_body = FlashcardRequest,
    responses(
        (status = 200, description = "Flashcard updated", body = FlashcardResponse),
        (status = 400, description = "Invalid card", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Flashcard not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn update_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<FlashcardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = FlashcardDraft::try_from(body)?;
    let card = state
        .db
        .flashcard_repo()
        .update(id, auth.user.id, &draft)
        .await?
        .ok_or_else(|| card_not_found(id))?;

    Ok(axum::Json(FlashcardResponse::from(card)))
}

#[utoipa::path(
    delete,
    path = "/v1/flashcards/{id}",
    params(("id" = Uuid, Path, description = "Flashcard ID")),
    responses(
        (status = 204, description = "Flashcard deleted"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Flashcard not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn delete_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.flashcard_repo().delete(id, auth.user.id).await? {
        return Err(card_not_found(id).into());
    }
    state.stats.invalidate(auth.user.id).await;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/flashcards/{id}/confidence",
    params(("id" = Uuid, Path, description = "Flashcard ID")),
    request_body = ConfidenceRequest,
    responses(
        (status = 200, description = "Review recorded and next review scheduled", body = FlashcardResponse),
        (status = 400, description = "Confidence outside 1-5", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Flashcard not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn record_confidence(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<ConfidenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let confidence = Confidence::parse(body.confidence)?;
    let card = state
        .db
        .flashcard_repo()
        .record_confidence(id, auth.user.id, confidence, Utc::now())
        .await?
        .ok_or_else(|| card_not_found(id))?;
    state.stats.invalidate(auth.user.id).await;

    tracing::debug!(
        card_id = %id,
        confidence = confidence.value(),
        next_review_at = ?card.next_review_at,
        "Flashcard reviewed"
    );

    Ok(axum::Json(FlashcardResponse::from(card)))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/flashcard-categories",
    responses(
        (status = 200, description = "The caller's categories with card counts", body = CategoryListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.db.flashcard_repo().list_categories(auth.user.id).await?;
    Ok(axum::Json(CategoryListResponse {
        categories: categories.into_iter().map(CategoryResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/flashcard-categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid category", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = CategoryDraft::try_from(body)?;
    let category = state
        .db
        .flashcard_repo()
        .create_category(auth.user.id, &draft)
        .await?;

    Ok((StatusCode::CREATED, axum::Json(CategoryResponse::from(category))))
}

#[utoipa::path(
    put,
    path = "/v1/flashcard-categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Invalid category", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = CategoryDraft::try_from(body)?;
    let category = state
        .db
        .flashcard_repo()
        .update_category(id, auth.user.id, &draft)
        .await?
        .ok_or_else(|| category_not_found(id))?;

    Ok(axum::Json(CategoryResponse::from(category)))
}

#[utoipa::path(
    delete,
    path = "/v1/flashcard-categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted; its cards become uncategorized"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .flashcard_repo()
        .delete_category(id, auth.user.id)
        .await?
    {
        return Err(category_not_found(id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Study sessions
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/flashcard-sessions",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent study sessions", body = SessionListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .db
        .flashcard_repo()
        .list_sessions(auth.user.id, clamp_limit(query.limit))
        .await?;
    let count = sessions.len();

    Ok(axum::Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(FlashcardSessionResponse::from)
            .collect(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/flashcard-sessions",
    request_body = FlashcardSessionRequest,
    responses(
        (status = 201, description = "Session recorded and XP awarded", body = RecordSessionResponse),
        (status = 400, description = "Invalid session", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "flashcards"
)]
pub async fn record_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<FlashcardSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_session = NewFlashcardSession::try_from(body)?;
    if let Some(category_id) = new_session.category_id {
        state
            .db
            .flashcard_repo()
            .get_category(category_id)
            .await?
            .filter(|c| c.owner_id == auth.user.id)
            .ok_or_else(|| AppError::Validation(format!("Unknown category_id {category_id}")))?;
    }

    let session = state
        .db
        .flashcard_repo()
        .create_session(auth.user.id, &new_session, Utc::now())
        .await?;
    let event = ProgressEvent::FlashcardsReviewed {
        cards: new_session.cards_studied.max(0) as u32,
    };
    let progress = state
        .db
        .user_repo()
        .record_progress(auth.user.id, &event, Utc::now().date_naive())
        .await?;
    state.stats.invalidate(auth.user.id).await;

    let response = RecordSessionResponse {
        session: session.into(),
        progress: progress.into(),
    };

    Ok((StatusCode::CREATED, axum::Json(response)))
}
