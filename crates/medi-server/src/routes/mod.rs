use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::require_user;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub mod ai;
pub mod cases;
pub mod flashcards;
pub mod health;
pub mod quizzes;
pub mod session;
pub mod uploads;
pub mod users;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.uploads.policy.max_bytes as usize + MULTIPART_OVERHEAD;

    let api = Router::new()
        // Auth
        .route("/v1/auth/me", get(session::me))
        // Users
        .route("/v1/users/me", get(users::get_me).patch(users::update_me))
        .route("/v1/users/me/progress", get(users::get_progress))
        .route("/v1/users/me/xp", post(users::award_xp))
        .route("/v1/users/me/activity", get(users::list_activity))
        .route("/v1/users/me/study-time", post(users::record_study_time))
        .route("/v1/users/me/stats", get(users::get_stats))
        .route("/v1/users/leaderboard", get(users::leaderboard))
        // Cases
        .route("/v1/cases", get(cases::list_cases).post(cases::create_case))
        .route(
            "/v1/cases/{id}",
            get(cases::get_case)
                .put(cases::update_case)
                .delete(cases::delete_case),
        )
        .route(
            "/v1/cases/{id}/rating",
            get(cases::get_rating)
                .put(cases::rate_case)
                .delete(cases::delete_rating),
        )
        // Quizzes
        .route("/v1/quizzes", get(quizzes::list_quizzes).post(quizzes::create_quiz))
        .route("/v1/quizzes/generate", post(quizzes::generate_quiz))
        .route(
            "/v1/quizzes/{id}",
            get(quizzes::get_quiz)
                .put(quizzes::update_quiz)
                .delete(quizzes::delete_quiz),
        )
        .route(
            "/v1/quizzes/{id}/attempts",
            get(quizzes::list_attempts).post(quizzes::submit_attempt),
        )
        .route("/v1/quizzes/{id}/analytics", get(quizzes::get_analytics))
        // Flashcards
        .route(
            "/v1/flashcards",
            get(flashcards::list_flashcards).post(flashcards::create_flashcard),
        )
        .route(
            "/v1/flashcards/{id}",
            get(flashcards::get_flashcard)
                .put(flashcards::update_flashcard)
                .delete(flashcards::delete_flashcard),
        )
        .route("/v1/flashcards/{id}/confidence", post(flashcards::record_confidence))
        .route(
            "/v1/flashcard-categories",
            get(flashcards::list_categories).post(flashcards::create_category),
        )
        .route(
            "/v1/flashcard-categories/{id}",
            put(flashcards::update_category).delete(flashcards::delete_category),
        )
        .route(
            "/v1/flashcard-sessions",
            get(flashcards::list_sessions).post(flashcards::record_session),
        )
        // Uploads
        .route(
            "/v1/uploads",
            post(uploads::create_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/v1/uploads/{id}",
            get(uploads::get_upload).delete(uploads::delete_upload),
        )
        // AI
        .route("/v1/ai/chat", post(ai::chat))
        .route("/v1/ai/generate", post(ai::generate))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let public = Router::new()
        .route("/health", get(health::health))
        // Logout authenticates inside the handler so login can stay public.
        .route(
            "/v1/auth/session",
            post(session::create_session).delete(session::delete_session),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}
