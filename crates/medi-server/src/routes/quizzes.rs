use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use uuid::Uuid;

use medi_core::AppError;
use medi_core::gamification::ProgressEvent;
use medi_core::models::clamp_limit;
use medi_core::quiz::{Quiz, QuizDraft, QuizSource, analyze, grade};
use medi_core::traits::{ChatMessage, CompletionRequest};
use medi_core::tutor::{
    QUIZ_GENERATOR_PROMPT, parse_generated_questions, quiz_generation_prompt,
    validate_question_count,
};
use medi_core::user::User;

use crate::auth::AuthUser;
use crate::dto::{
    AnalyticsResponse, AttemptListResponse, AttemptResponse, AttemptResultResponse,
    GenerateQuizRequest, ListQuizzesQuery, QuestionOutcomeResponse, QuizListResponse,
    QuizRequest, QuizResponse, SubmitAttemptRequest,
};
use crate::error::ApiError;
use crate::routes::cases::load_visible_case;
use crate::state::AppState;

const DEFAULT_GENERATED_QUESTIONS: usize = 5;

async fn load_visible_quiz(state: &AppState, id: Uuid, user: &User) -> Result<Quiz, AppError> {
    state
        .db
        .quiz_repo()
        .get(id)
        .await?
        .filter(|q| q.is_visible_to(user.id) || user.role.is_admin())
        .ok_or_else(|| AppError::NotFound(format!("Quiz {id} not found")))
}

fn ensure_owner(user: &User, quiz: &Quiz) -> Result<(), AppError> {
    if user.can_modify(quiz.owner_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the quiz owner can do this".into()))
    }
}

/// Linked cases must be visible to the caller.
async fn check_case_link(state: &AppState, draft: &QuizDraft, user: &User) -> Result<(), AppError> {
    if let Some(case_id) = draft.case_id {
        load_visible_case(state, case_id, user)
            .await
            .map_err(|_| AppError::Validation(format!("Unknown case_id {case_id}")))?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/quizzes",
    params(ListQuizzesQuery),
    responses(
        (status = 200, description = "Own and public quizzes", body = QuizListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn list_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuizzesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let quizzes = state
        .db
        .quiz_repo()
        .list(
            auth.user.id,
            query.mine,
            clamp_limit(query.limit),
            query.offset.unwrap_or(0),
        )
        .await?;
    let count = quizzes.len();

    Ok(axum::Json(QuizListResponse {
        quizzes: quizzes
            .into_iter()
            .map(|q| QuizResponse::for_viewer(q, auth.user.id))
            .collect(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/quizzes",
    request_body = QuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = QuizResponse),
        (status = 400, description = "Invalid quiz", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<QuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = QuizDraft::try_from(body)?;
    check_case_link(&state, &draft, &auth.user).await?;

    let quiz = state
        .db
        .quiz_repo()
        .create(auth.user.id, &draft, QuizSource::Manual)
        .await?;

    Ok((
        StatusCode::CREATED,
        axum::Json(QuizResponse::for_viewer(quiz, auth.user.id)),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/quizzes/generate",
    request_body = GenerateQuizRequest,
    responses(
        (status = 201, description = "Generated quiz saved", body = QuizResponse),
        (status = 400, description = "Invalid request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 502, description = "Model returned an unusable quiz", body = crate::dto::ErrorResponse),
        (status = 503, description = "AI is not configured", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let topic = body.topic.trim();
    if topic.is_empty() || topic.chars().count() > 200 {
        return Err(AppError::Validation("topic must be between 1 and 200 characters".into()).into());
    }
    let count = body.question_count.unwrap_or(DEFAULT_GENERATED_QUESTIONS);
    validate_question_count(count)?;
    let difficulty = body.difficulty()?;

    let case_context = match body.case_id {
        Some(case_id) => Some(load_visible_case(&state, case_id, &auth.user).await?.context_text()),
        None => None,
    };

    let prompt = quiz_generation_prompt(topic, difficulty, count, case_context.as_deref());
    let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
        .with_system(QUIZ_GENERATOR_PROMPT)
        .json();
    let completion = state.generator.complete(request).await?;

    let questions = parse_generated_questions(&completion.text, count)?;

    let draft = QuizDraft {
        title: body
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{topic} quiz")),
        topic: topic.to_string(),
        difficulty,
        case_id: body.case_id,
        questions,
        is_public: body.is_public,
        time_limit_secs: None,
    };
    draft.validate()?;

    let quiz = state
        .db
        .quiz_repo()
        .create(auth.user.id, &draft, QuizSource::Generated)
        .await?;
    tracing::info!(
        quiz_id = %quiz.id,
        user_id = %auth.user.id,
        model = %completion.model,
        questions = quiz.questions.len(),
        "Quiz generated"
    );

    Ok((
        StatusCode::CREATED,
        axum::Json(QuizResponse::for_viewer(quiz, auth.user.id)),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Quiz; answers only for the owner", body = QuizResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    Ok(axum::Json(QuizResponse::for_viewer(quiz, auth.user.id)))
}

#[utoipa::path(
    put,
    path = "/v1/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Quiz updated", body = QuizResponse),
        (status = 400, description = "Invalid quiz", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<QuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    ensure_owner(&auth.user, &quiz)?;

    let draft = QuizDraft::try_from(body)?;
    check_case_link(&state, &draft, &auth.user).await?;
    let updated = state
        .db
        .quiz_repo()
        .update(id, &draft)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {id} not found")))?;

    Ok(axum::Json(QuizResponse::for_viewer(updated, auth.user.id)))
}

#[utoipa::path(
    delete,
    path = "/v1/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 204, description = "Quiz and its attempts deleted"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    ensure_owner(&auth.user, &quiz)?;

    state.db.quiz_repo().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 201, description = "Attempt graded and recorded", body = AttemptResultResponse),
        (status = 400, description = "Answer count does not match", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.duration_secs < 0 {
        return Err(AppError::Validation("duration_secs must not be negative".into()).into());
    }

    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    let result = grade(&quiz.questions, &body.answers)?;
    let event = ProgressEvent::QuizCompleted {
        score: result.score,
        correct: result.correct_count as u32,
    };

    let attempt = state
        .db
        .quiz_repo()
        .record_attempt(
            quiz.id,
            auth.user.id,
            &body.answers,
            &result,
            body.duration_secs,
            event.xp(),
        )
        .await?;
    let progress = state
        .db
        .user_repo()
        .record_progress(auth.user.id, &event, Utc::now().date_naive())
        .await?;
    state.stats.invalidate(auth.user.id).await;

    tracing::info!(
        quiz_id = %quiz.id,
        user_id = %auth.user.id,
        score = result.score,
        "Quiz attempt recorded"
    );

    let response = AttemptResultResponse {
        attempt: attempt.into(),
        outcomes: result
            .outcomes
            .into_iter()
            .map(QuestionOutcomeResponse::from)
            .collect(),
        progress: progress.into(),
    };

    Ok((StatusCode::CREATED, axum::Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Attempts; the owner sees everyone's", body = AttemptListResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    let scope = if auth.user.can_modify(quiz.owner_id) {
        None
    } else {
        Some(auth.user.id)
    };

    let attempts = state.db.quiz_repo().list_attempts(id, scope).await?;
    let count = attempts.len();

    Ok(axum::Json(AttemptListResponse {
        attempts: attempts.into_iter().map(AttemptResponse::from).collect(),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/quizzes/{id}/analytics",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Score distribution and per-question correct rates", body = AnalyticsResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::dto::ErrorResponse),
        (status = 404, description = "Quiz not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = load_visible_quiz(&state, id, &auth.user).await?;
    ensure_owner(&auth.user, &quiz)?;

    let attempts = state.db.quiz_repo().list_attempts(id, None).await?;
    let analytics = analyze(&quiz.questions, &attempts);

    Ok(axum::Json(AnalyticsResponse::new(id, analytics)))
}
