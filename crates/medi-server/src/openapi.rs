use utoipa::OpenApi;

use crate::routes::{ai, cases, flashcards, health, quizzes, session, uploads, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medi API",
        version = "0.1.0",
        description = "Clinical cases, quizzes, spaced-repetition flashcards, and an AI tutor for medical students."
    ),
    paths(
        health::health,
        session::create_session,
        session::delete_session,
        session::me,
        users::get_me,
        users::update_me,
        users::get_progress,
        users::award_xp,
        users::record_study_time,
        users::list_activity,
        users::get_stats,
        users::leaderboard,
        cases::list_cases,
        cases::create_case,
        cases::get_case,
        cases::update_case,
        cases::delete_case,
        cases::get_rating,
        cases::rate_case,
        cases::delete_rating,
        quizzes::list_quizzes,
        quizzes::create_quiz,
        quizzes::generate_quiz,
        quizzes::get_quiz,
        quizzes::update_quiz,
        quizzes::delete_quiz,
        quizzes::submit_attempt,
        quizzes::list_attempts,
        quizzes::get_analytics,
        flashcards::list_flashcards,
        flashcards::create_flashcard,
        flashcards::get_flashcard,
        flashcards::update_flashcard,
        flashcards::delete_flashcard,
        flashcards::record_confidence,
        flashcards::list_categories,
        flashcards::create_category,
        flashcards::update_category,
        flashcards::delete_category,
        flashcards::list_sessions,
        flashcards::record_session,
        uploads::create_upload,
        uploads::get_upload,
        uploads::delete_upload,
        ai::chat,
        ai::generate,
    ),
    components(schemas(
        crate::dto::CreateSessionRequest,
        crate::dto::SessionResponse,
        crate::dto::UserResponse,
        crate::dto::UpdateProfileRequest,
        crate::dto::AchievementResponse,
        crate::dto::ProgressResponse,
        crate::dto::AwardXpRequest,
        crate::dto::StudyTimeRequest,
        crate::dto::ProgressUpdateResponse,
        crate::dto::ActivityResponse,
        crate::dto::ActivityListResponse,
        crate::dto::LeaderboardEntryResponse,
        crate::dto::LeaderboardResponse,
        crate::dto::StatsResponse,
        crate::dto::CaseRequest,
        crate::dto::CaseResponse,
        crate::dto::CaseListResponse,
        crate::dto::RateCaseRequest,
        crate::dto::RatingResponse,
        crate::dto::RatingSummaryResponse,
        crate::dto::RateCaseResponse,
        crate::dto::QuestionDto,
        crate::dto::QuizRequest,
        crate::dto::QuizResponse,
        crate::dto::QuizListResponse,
        crate::dto::GenerateQuizRequest,
        crate::dto::SubmitAttemptRequest,
        crate::dto::QuestionOutcomeResponse,
        crate::dto::AttemptResultResponse,
        crate::dto::AttemptResponse,
        crate::dto::AttemptListResponse,
        crate::dto::AnalyticsResponse,
        crate::dto::FlashcardRequest,
        crate::dto::FlashcardResponse,
        crate::dto::FlashcardListResponse,
        crate::dto::ConfidenceRequest,
        crate::dto::CategoryRequest,
        crate::dto::CategoryResponse,
        crate::dto::CategoryListResponse,
        crate::dto::FlashcardSessionRequest,
        crate::dto::FlashcardSessionResponse,
        crate::dto::RecordSessionResponse,
        crate::dto::SessionListResponse,
        crate::dto::UploadResponse,
        crate::dto::UploadForm,
        crate::dto::ChatMessageDto,
        crate::dto::ChatRequest,
        crate::dto::ChatResponse,
        crate::dto::GenerateTextRequest,
        crate::dto::GenerateTextResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Sign-in sessions"),
        (name = "users", description = "Profile, progress, and statistics"),
        (name = "cases", description = "Clinical cases and ratings"),
        (name = "quizzes", description = "Quizzes, attempts, and analytics"),
        (name = "flashcards", description = "Flashcards, categories, and study sessions"),
        (name = "uploads", description = "File uploads"),
        (name = "ai", description = "AI tutor and text generation"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Session token from POST /v1/auth/session, or an identity-service ID token. \
                             Browsers may send the medi_session cookie instead.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
