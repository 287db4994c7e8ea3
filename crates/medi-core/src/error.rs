use thiserror::Error;

/// Application-wide error types for Medi.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request payload failed a domain rule (bad rating, empty title, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested resource does not exist or is not visible to the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, expired, or rejected credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unique constraint or state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload exceeded the configured size limit.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Upload MIME type is not on the allow list.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// HTTP request to an upstream service failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// No AI provider configured for this deployment.
    #[error("AI features are not configured")]
    AiUnavailable,

    /// Identity service returned an unexpected response.
    #[error("Identity service error: {0}")]
    IdentityError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Returns true for errors caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::Unauthorized(_)
                | AppError::Forbidden(_)
                | AppError::Conflict(_)
                | AppError::PayloadTooLarge { .. }
                | AppError::UnsupportedMediaType(_)
                | AppError::SerializationError(_)
        )
    }
}
