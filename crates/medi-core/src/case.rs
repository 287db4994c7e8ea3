use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Difficulty;

/// A clinical case study.
#[derive(Debug, Clone, Serialize)]
pub struct Case {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub specialty: String,
    pub difficulty: Difficulty,
    pub summary: String,
    pub presentation: String,
    pub history: Option<String>,
    pub examination: Option<String>,
    pub investigations: Option<String>,
    pub diagnosis: Option<String>,
    pub management: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub view_count: i64,
    pub rating_sum: i64,
    pub rating_count: i64,
    pub rating_avg: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Published cases are visible to everyone, drafts only to their author.
    pub fn is_visible_to(&self, user_id: Uuid, is_admin: bool) -> bool {
        self.published || self.author_id == user_id || is_admin
    }

    /// Short text block used as tutor/quiz-generation context.
    pub fn context_text(&self) -> String {
        let mut text = format!(
            "Title: {}\nSpecialty: {}\nDifficulty: {}\nSummary: {}\nPresentation: {}",
            self.title, self.specialty, self.difficulty, self.summary, self.presentation
        );
        for (label, value) in [
            ("History", &self.history),
            ("Examination", &self.examination),
            ("Investigations", &self.investigations),
            ("Diagnosis", &self.diagnosis),
            ("Management", &self.management),
        ] {
            if let Some(value) = value {
                text.push_str(&format!("\n{label}: {value}"));
            }
        }
        text
    }
}

/// Payload for creating or fully replacing a case.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseDraft {
    pub title: String,
    pub specialty: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub summary: String,
    pub presentation: String,
    pub history: Option<String>,
    pub examination: Option<String>,
    pub investigations: Option<String>,
    pub diagnosis: Option<String>,
    pub management: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

impl CaseDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.title.chars().count() > 200 {
            return Err(AppError::Validation(
                "title must be between 1 and 200 characters".into(),
            ));
        }
        if self.specialty.trim().is_empty() {
            return Err(AppError::Validation("specialty is required".into()));
        }
        if self.summary.trim().is_empty() {
            return Err(AppError::Validation("summary is required".into()));
        }
        if self.presentation.trim().is_empty() {
            return Err(AppError::Validation("presentation is required".into()));
        }
        if self.tags.len() > 20 {
            return Err(AppError::Validation("at most 20 tags are allowed".into()));
        }
        Ok(())
    }
}

/// Filters for listing cases.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub specialty: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A single user's rating of a case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseRating {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
