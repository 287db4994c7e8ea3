use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A user-owned flashcard.
#[derive(Debug, Clone, Serialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Option<Uuid>,
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    /// 0 until first review, then 1..=5.
    pub confidence: i16,
    pub review_count: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or replacing a flashcard.
#[derive(Debug, Clone, Deserialize)]
pub struct FlashcardDraft {
    pub category_id: Option<Uuid>,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FlashcardDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.front.trim().is_empty() {
            return Err(AppError::Validation("front must not be empty".into()));
        }
        if self.back.trim().is_empty() {
            return Err(AppError::Validation("back must not be empty".into()));
        }
        if self.front.chars().count() > 4000 || self.back.chars().count() > 4000 {
            return Err(AppError::Validation(
                "card sides must be at most 4000 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Filters for listing flashcards.
#[derive(Debug, Clone, Default)]
pub struct FlashcardFilter {
    pub category_id: Option<Uuid>,
    /// Only cards whose next review is due now.
    pub due_only: bool,
    pub limit: usize,
}

/// A named group of flashcards.
#[derive(Debug, Clone, Serialize)]
pub struct FlashcardCategory {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        let len = self.name.trim().chars().count();
        if len == 0 || len > 100 {
            return Err(AppError::Validation(
                "category name must be between 1 and 100 characters".into(),
            ));
        }
        if let Some(color) = &self.color {
            let hex = color.strip_prefix('#').unwrap_or("");
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(AppError::Validation(format!(
                    "color must be a #rrggbb hex value, got {color}"
                )));
            }
        }
        Ok(())
    }
}

/// A completed study session.
#[derive(Debug, Clone, Serialize)]
pub struct FlashcardSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub cards_studied: i32,
    pub correct_count: i32,
    pub duration_secs: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFlashcardSession {
    pub category_id: Option<Uuid>,
    pub cards_studied: i32,
    pub correct_count: i32,
    pub duration_secs: i32,
}

impl NewFlashcardSession {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.cards_studied < 0 || self.correct_count < 0 || self.duration_secs < 0 {
            return Err(AppError::Validation(
                "session counters must not be negative".into(),
            ));
        }
        if self.correct_count > self.cards_studied {
            return Err(AppError::Validation(
                "correct_count cannot exceed cards_studied".into(),
            ));
        }
        if self.duration_secs > 24 * 3600 {
            return Err(AppError::Validation(
                "a session cannot last longer than 24 hours".into(),
            ));
        }
        Ok(())
    }
}
