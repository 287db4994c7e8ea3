use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::response::IntoResponse;

use medi_core::AppError;
use medi_core::traits::{ChatMessage, CompletionRequest};
use medi_core::tutor::{tutor_system_prompt, validate_conversation};

use crate::auth::AuthUser;
use crate::dto::{ChatRequest, ChatResponse, GenerateTextRequest, GenerateTextResponse};
use crate::error::ApiError;
use crate::routes::cases::load_visible_case;
use crate::state::AppState;

const MAX_PROMPT_CHARS: usize = 8000;

#[utoipa::path(
    post,
    path = "/v1/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Tutor reply", body = ChatResponse),
        (status = 400, description = "Invalid conversation", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Case not found", body = crate::dto::ErrorResponse),
        (status = 502, description = "AI provider error", body = crate::dto::ErrorResponse),
        (status = 503, description = "AI is not configured", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = body
        .messages
        .into_iter()
        .map(ChatMessage::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    validate_conversation(&messages)?;

    let case_context = match body.case_id {
        Some(case_id) => Some(load_visible_case(&state, case_id, &auth.user).await?.context_text()),
        None => None,
    };

    let request = CompletionRequest::new(messages)
        .with_system(tutor_system_prompt(case_context.as_deref()));
    let completion = state.generator.complete(request).await?;

    tracing::debug!(user_id = %auth.user.id, model = %completion.model, "Tutor replied");

    Ok(axum::Json(ChatResponse {
        reply: completion.text,
        model: completion.model,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/ai/generate",
    request_body = GenerateTextRequest,
    responses(
        (status = 200, description = "Generated text", body = GenerateTextResponse),
        (status = 400, description = "Invalid prompt", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 502, description = "AI provider error", body = crate::dto::ErrorResponse),
        (status = 503, description = "AI is not configured", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    axum::Json(body): axum::Json<GenerateTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt_len = body.prompt.trim().chars().count();
    if prompt_len == 0 || prompt_len > MAX_PROMPT_CHARS {
        return Err(AppError::Validation(format!(
            "prompt must be between 1 and {MAX_PROMPT_CHARS} characters"
        ))
        .into());
    }
    if body
        .system
        .as_ref()
        .is_some_and(|s| s.chars().count() > MAX_PROMPT_CHARS)
    {
        return Err(AppError::Validation(format!(
            "system must be at most {MAX_PROMPT_CHARS} characters"
        ))
        .into());
    }

    let mut request = CompletionRequest::new(vec![ChatMessage::user(body.prompt)]);
    if let Some(system) = body.system.filter(|s| !s.trim().is_empty()) {
        request = request.with_system(system);
    }
    if body.json {
        request = request.json();
    }

    let completion = state.generator.complete(request).await?;
    tracing::debug!(user_id = %auth.user.id, model = %completion.model, "Text generated");

    Ok(axum::Json(GenerateTextResponse {
        text: completion.text,
        model: completion.model,
    }))
}
