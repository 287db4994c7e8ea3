use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use medi_core::error::AppError;
use medi_core::quiz::{Question, Quiz, QuizAttempt, QuizDraft, QuizResult, QuizSource};

use crate::database::db_err;

/// Quizzes and quiz attempts.
#[derive(Clone)]
pub struct QuizRepository {
    pool: PgPool,
}

impl QuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    topic: String,
    difficulty: String,
    case_id: Option<Uuid>,
    questions: Json<Vec<Question>>,
    source: String,
    is_public: bool,
    time_limit_secs: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            topic: row.topic,
            difficulty: row.difficulty.parse().unwrap_or_default(),
            case_id: row.case_id,
            questions: row.questions.0,
            source: row.source.parse().unwrap_or(QuizSource::Manual),
            is_public: row.is_public,
            time_limit_secs: row.time_limit_secs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: Uuid,
    user_id: Uuid,
    answers: Json<Vec<Option<usize>>>,
    correct_count: i32,
    total_questions: i32,
    score: f64,
    duration_secs: i32,
    xp_awarded: i32,
    completed_at: DateTime<Utc>,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            answers: row.answers.0,
            correct_count: row.correct_count,
            total_questions: row.total_questions,
            score: row.score,
            duration_secs: row.duration_secs,
            xp_awarded: row.xp_awarded,
            completed_at: row.completed_at,
        }
    }
}

impl QuizRepository {
    pub async fn create(
        &self,
        owner_id: Uuid,
        draft: &QuizDraft,
        source: QuizSource,
    ) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            INSERT INTO quizzes (owner_id, title, topic, difficulty, case_id, questions,
                                 source, is_public, time_limit_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&draft.title)
        .bind(&draft.topic)
        .bind(draft.difficulty.as_str())
        .bind(draft.case_id)
        .bind(Json(&draft.questions))
        .bind(source.as_str())
        .bind(draft.is_public)
        .bind(draft.time_limit_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::info!(quiz_id = %row.id, %owner_id, source = source.as_str(), "Quiz created");
        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// Quizzes owned by `viewer_id`, plus public ones unless `mine_only`.
    pub async fn list(
        &self,
        viewer_id: Uuid,
        mine_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Quiz>, AppError> {
        let rows = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT * FROM quizzes
            WHERE owner_id = $1 OR (is_public AND NOT $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(viewer_id)
        .bind(mine_only)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update(&self, id: Uuid, draft: &QuizDraft) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            UPDATE quizzes
            SET title = $2, topic = $3, difficulty = $4, case_id = $5, questions = $6,
                is_public = $7, time_limit_secs = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.topic)
        .bind(draft.difficulty.as_str())
        .bind(draft.case_id)
        .bind(Json(&draft.questions))
        .bind(draft.is_public)
        .bind(draft.time_limit_secs)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    // -- Attempts --

    pub async fn record_attempt(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        answers: &[Option<usize>],
        result: &QuizResult,
        duration_secs: i32,
        xp_awarded: i32,
    ) -> Result<QuizAttempt, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO quiz_attempts (quiz_id, user_id, answers, correct_count,
                                       total_questions, score, duration_secs, xp_awarded)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .bind(Json(answers))
        .bind(result.correct_count as i32)
        .bind(result.total_questions as i32)
        .bind(result.score)
        .bind(duration_secs)
        .bind(xp_awarded)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    /// Attempts at a quiz, newest first; restricted to one user when given.
    pub async fn list_attempts(
        &self,
        quiz_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT * FROM quiz_attempts
            WHERE quiz_id = $1 AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY completed_at DESC
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
