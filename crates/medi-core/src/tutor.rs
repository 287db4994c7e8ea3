//! Prompts for the AI tutor and quiz generator, and parsing of generated quizzes.

use serde::Deserialize;

use crate::error::AppError;
use crate::models::Difficulty;
use crate::quiz::{Question, validate_questions};
use crate::traits::{ChatMessage, ChatRole};

pub const MAX_GENERATED_QUESTIONS: usize = 20;
const MAX_CHAT_MESSAGES: usize = 40;
const MAX_MESSAGE_CHARS: usize = 8000;

const TUTOR_PROMPT: &str = "You are a patient clinical tutor for medical students. \
Explain reasoning step by step, reference standard guidelines where relevant, \
and ask a short follow-up question to check understanding. \
Never present content as personal medical advice.";

/// System prompt for tutor conversations, optionally grounded in a case.
pub fn tutor_system_prompt(case_context: Option<&str>) -> String {
    match case_context {
        Some(context) => format!(
            "{TUTOR_PROMPT}\n\nThe student is working through this clinical case:\n{context}\n\n\
             Do not reveal the diagnosis unless the student asks for it explicitly."
        ),
        None => TUTOR_PROMPT.to_string(),
    }
}

/// Check a client-supplied conversation before it is forwarded.
pub fn validate_conversation(messages: &[ChatMessage]) -> Result<(), AppError> {
    if messages.is_empty() {
        return Err(AppError::Validation("messages must not be empty".into()));
    }
    if messages.len() > MAX_CHAT_MESSAGES {
        return Err(AppError::Validation(format!(
            "at most {MAX_CHAT_MESSAGES} messages per request"
        )));
    }
    if messages.iter().any(|m| m.role == ChatRole::System) {
        return Err(AppError::Validation(
            "system messages are set by the server".into(),
        ));
    }
    if messages
        .iter()
        .any(|m| m.content.trim().is_empty() || m.content.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(AppError::Validation(format!(
            "message content must be 1-{MAX_MESSAGE_CHARS} characters"
        )));
    }
    if messages.last().map(|m| m.role) != Some(ChatRole::User) {
        return Err(AppError::Validation(
            "the last message must come from the user".into(),
        ));
    }
    Ok(())
}

pub const QUIZ_GENERATOR_PROMPT: &str = "You write multiple-choice questions for medical students. \
Respond ONLY with a JSON object of the form \
{\"questions\": [{\"prompt\": string, \"options\": [string, ...], \"correct_index\": number, \"explanation\": string}]}. \
Each question has exactly four options and one correct answer. Do not include explanations outside the JSON.";

/// User prompt asking for `count` questions on `topic`.
pub fn quiz_generation_prompt(
    topic: &str,
    difficulty: Difficulty,
    count: usize,
    case_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Write {count} {difficulty} level multiple-choice questions about: {topic}."
    );
    if let Some(context) = case_context {
        prompt.push_str("\n\nBase the questions on this clinical case:\n");
        prompt.push_str(context);
    }
    prompt
}

pub fn validate_question_count(count: usize) -> Result<(), AppError> {
    if !(1..=MAX_GENERATED_QUESTIONS).contains(&count) {
        return Err(AppError::Validation(format!(
            "question_count must be between 1 and {MAX_GENERATED_QUESTIONS}"
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct GeneratedQuiz {
    questions: Vec<Question>,
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output into at most `count` validated questions.
///
/// Accepts either `{"questions": [...]}` or a bare array. Questions past
/// `count` are dropped before validation.
pub fn parse_generated_questions(text: &str, count: usize) -> Result<Vec<Question>, AppError> {
    let body = strip_code_fence(text);
    let mut questions = match serde_json::from_str::<GeneratedQuiz>(body) {
        Ok(quiz) => quiz.questions,
        Err(_) => serde_json::from_str::<Vec<Question>>(body).map_err(|e| {
            AppError::LlmError {
                message: format!("model returned malformed quiz JSON: {e}"),
                status_code: 200,
                retryable: false,
            }
        })?,
    };
    questions.truncate(count);

    validate_questions(&questions).map_err(|e| AppError::LlmError {
        message: format!("model returned an invalid quiz: {e}"),
        status_code: 200,
        retryable: false,
    })?;
    Ok(questions)
}
