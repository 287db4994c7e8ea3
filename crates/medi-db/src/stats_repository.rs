use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use medi_core::error::AppError;
use medi_core::scheduling::Confidence;
use medi_core::stats::UserStats;

use crate::database::db_err;

/// Aggregate queries behind `GET /v1/users/me/stats`.
#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_cards: i64,
    due_cards: i64,
    mastered_cards: i64,
    average_confidence: f64,
    session_count: i64,
    cards_studied: i64,
    correct_studied: i64,
    total_study_secs: i64,
    quiz_attempts: i64,
    average_quiz_score: f64,
    xp: i64,
    level: i32,
    streak_days: i32,
}

impl StatsRepository {
    /// Compute fresh statistics for one user.
    pub async fn compute(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<UserStats, AppError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                f.total_cards, f.due_cards, f.mastered_cards, f.average_confidence,
                s.session_count, s.cards_studied, s.correct_studied, s.total_study_secs,
                q.quiz_attempts, q.average_quiz_score,
                u.xp, u.level, u.streak_days
            FROM users u
            CROSS JOIN (
                SELECT
                    COUNT(*) AS total_cards,
                    COUNT(*) FILTER (WHERE next_review_at IS NULL OR next_review_at <= $2) AS due_cards,
                    COUNT(*) FILTER (WHERE confidence >= $3) AS mastered_cards,
                    COALESCE(AVG(confidence) FILTER (WHERE confidence > 0), 0)::DOUBLE PRECISION
                        AS average_confidence
                FROM flashcards WHERE owner_id = $1
            ) f
            CROSS JOIN (
                SELECT
                    COUNT(*) AS session_count,
                    COALESCE(SUM(cards_studied), 0)::BIGINT AS cards_studied,
                    COALESCE(SUM(correct_count), 0)::BIGINT AS correct_studied,
                    COALESCE(SUM(duration_secs), 0)::BIGINT AS total_study_secs
                FROM flashcard_sessions WHERE user_id = $1
            ) s
            CROSS JOIN (
                SELECT
                    COUNT(*) AS quiz_attempts,
                    COALESCE(AVG(score), 0)::DOUBLE PRECISION AS average_quiz_score
                FROM quiz_attempts WHERE user_id = $1
            ) q
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(Confidence::MASTERED)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        let session_accuracy = if row.cards_studied > 0 {
            round2(row.correct_studied as f64 * 100.0 / row.cards_studied as f64)
        } else {
            0.0
        };

        tracing::debug!(%user_id, "Computed user stats");
        Ok(UserStats {
            user_id,
            total_cards: row.total_cards,
            due_cards: row.due_cards,
            mastered_cards: row.mastered_cards,
            average_confidence: round2(row.average_confidence),
            session_count: row.session_count,
            cards_studied: row.cards_studied,
            total_study_secs: row.total_study_secs,
            session_accuracy,
            quiz_attempts: row.quiz_attempts,
            average_quiz_score: round2(row.average_quiz_score),
            xp: row.xp,
            level: row.level,
            streak_days: row.streak_days,
            computed_at: now,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
