//! Quizzes, grading, and analytics.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Difficulty;

pub const MAX_QUESTIONS: usize = 50;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    fn validate(&self, position: usize) -> Result<(), AppError> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "question {position}: prompt must not be empty"
            )));
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(AppError::Validation(format!(
                "question {position}: expected {MIN_OPTIONS}-{MAX_OPTIONS} options, got {}",
                self.options.len()
            )));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "question {position}: options must not be empty"
            )));
        }
        if self.correct_index >= self.options.len() {
            return Err(AppError::Validation(format!(
                "question {position}: correct_index {} out of range",
                self.correct_index
            )));
        }
        Ok(())
    }
}

/// Validate a full question list.
pub fn validate_questions(questions: &[Question]) -> Result<(), AppError> {
    if questions.is_empty() {
        return Err(AppError::Validation(
            "a quiz needs at least one question".into(),
        ));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(AppError::Validation(format!(
            "a quiz can have at most {MAX_QUESTIONS} questions"
        )));
    }
    for (i, q) in questions.iter().enumerate() {
        q.validate(i + 1)?;
    }
    Ok(())
}

/// Where a quiz's questions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizSource {
    Manual,
    Generated,
}

impl QuizSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizSource::Manual => "manual",
            QuizSource::Generated => "generated",
        }
    }
}

impl fmt::Display for QuizSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuizSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(QuizSource::Manual),
            "generated" => Ok(QuizSource::Generated),
            _ => Err(format!("Unknown quiz source: {}", s)),
        }
    }
}

/// A quiz owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub case_id: Option<Uuid>,
    pub questions: Vec<Question>,
    pub source: QuizSource,
    pub is_public: bool,
    pub time_limit_secs: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_public || self.owner_id == user_id
    }
}

/// Payload for creating or replacing a quiz.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub case_id: Option<Uuid>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub is_public: bool,
    pub time_limit_secs: Option<i32>,
}

impl QuizDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.title.chars().count() > 200 {
            return Err(AppError::Validation(
                "title must be between 1 and 200 characters".into(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(AppError::Validation("topic is required".into()));
        }
        if self.time_limit_secs.is_some_and(|t| t <= 0) {
            return Err(AppError::Validation(
                "time_limit_secs must be positive".into(),
            ));
        }
        validate_questions(&self.questions)
    }
}

/// A stored attempt at a quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub answers: Vec<Option<usize>>,
    pub correct_count: i32,
    pub total_questions: i32,
    pub score: f64,
    pub duration_secs: i32,
    pub xp_awarded: i32,
    pub completed_at: DateTime<Utc>,
}

/// Per-question grading outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionOutcome {
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Graded result of one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResult {
    pub correct_count: usize,
    pub total_questions: usize,
    /// Percentage, rounded to two decimals.
    pub score: f64,
    pub outcomes: Vec<QuestionOutcome>,
}

impl QuizResult {
    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.correct_count == self.total_questions
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grade a submission. Unanswered questions count as incorrect.
pub fn grade(questions: &[Question], answers: &[Option<usize>]) -> Result<QuizResult, AppError> {
    if answers.len() != questions.len() {
        return Err(AppError::Validation(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let outcomes: Vec<QuestionOutcome> = questions
        .iter()
        .zip(answers)
        .map(|(q, selected)| QuestionOutcome {
            selected: *selected,
            correct_index: q.correct_index,
            is_correct: *selected == Some(q.correct_index),
            explanation: q.explanation.clone(),
        })
        .collect();

    let correct_count = outcomes.iter().filter(|o| o.is_correct).count();
    let total_questions = questions.len();
    let score = if total_questions == 0 {
        0.0
    } else {
        round2(correct_count as f64 * 100.0 / total_questions as f64)
    };

    Ok(QuizResult {
        correct_count,
        total_questions,
        score,
        outcomes,
    })
}

/// Aggregated statistics across all attempts of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnalytics {
    pub attempt_count: usize,
    pub unique_participants: usize,
    pub average_score: f64,
    pub median_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub p25_score: f64,
    pub p75_score: f64,
    pub p90_score: f64,
    pub average_duration_secs: f64,
    /// Fraction of attempts answering each question correctly.
    pub question_correct_rates: Vec<f64>,
}

/// Nearest-rank percentile over an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Recompute analytics for a quiz from its attempts.
pub fn analyze(questions: &[Question], attempts: &[QuizAttempt]) -> QuizAnalytics {
    let question_count = questions.len();
    if attempts.is_empty() {
        return QuizAnalytics {
            attempt_count: 0,
            unique_participants: 0,
            average_score: 0.0,
            median_score: 0.0,
            min_score: 0.0,
            max_score: 0.0,
            p25_score: 0.0,
            p75_score: 0.0,
            p90_score: 0.0,
            average_duration_secs: 0.0,
            question_correct_rates: vec![0.0; question_count],
        };
    }

    let mut scores: Vec<f64> = attempts.iter().map(|a| a.score).collect();
    scores.sort_by(|a, b| a.total_cmp(b));

    let n = attempts.len() as f64;
    let participants: HashSet<Uuid> = attempts.iter().map(|a| a.user_id).collect();
    let average_duration =
        attempts.iter().map(|a| a.duration_secs as f64).sum::<f64>() / n;

    let mut correct = vec![0usize; question_count];
    for attempt in attempts {
        for (i, q) in questions.iter().enumerate() {
            if attempt.answers.get(i).copied().flatten() == Some(q.correct_index) {
                correct[i] += 1;
            }
        }
    }

    QuizAnalytics {
        attempt_count: attempts.len(),
        unique_participants: participants.len(),
        average_score: round2(scores.iter().sum::<f64>() / n),
        median_score: percentile(&scores, 50.0),
        min_score: scores[0],
        max_score: scores[scores.len() - 1],
        p25_score: percentile(&scores, 25.0),
        p75_score: percentile(&scores, 75.0),
        p90_score: percentile(&scores, 90.0),
        average_duration_secs: round2(average_duration),
        question_correct_rates: correct.iter().map(|c| round2(*c as f64 / n)).collect(),
    }
}
