use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::user::VerifiedIdentity;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Prompt sent to a text generation model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Ask the provider for a JSON object response.
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            system: None,
            messages,
            json_output: false,
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Text returned by a generation model.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Hosted generative language model.
///
/// Object-safe so the server can hold an `Arc<dyn TextGenerator>` and swap
/// in a mock under test.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<Completion, AppError>>;
}

/// Verifies bearer identity tokens against the external identity service.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the identity behind `token`, or `AppError::Unauthorized`
    /// if the service rejects it.
    fn verify<'a>(&'a self, token: &'a str)
    -> BoxFuture<'a, Result<VerifiedIdentity, AppError>>;
}

/// Generator used when no AI provider is configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn complete(&self, _request: CompletionRequest) -> BoxFuture<'_, Result<Completion, AppError>> {
        Box::pin(async { Err(AppError::AiUnavailable) })
    }
}
