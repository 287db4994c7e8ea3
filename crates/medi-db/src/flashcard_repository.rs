use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use medi_core::error::AppError;
use medi_core::flashcard::{
    CategoryDraft, Flashcard, FlashcardCategory, FlashcardDraft, FlashcardFilter,
    FlashcardSession, NewFlashcardSession,
};
use medi_core::scheduling::Confidence;

use crate::database::db_err;

/// Flashcards, their categories, and study sessions.
#[derive(Clone)]
pub struct FlashcardRepository {
    pool: PgPool,
}

impl FlashcardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlashcardRow {
    id: Uuid,
    owner_id: Uuid,
    category_id: Option<Uuid>,
    front: String,
    back: String,
    tags: Vec<String>,
    confidence: i16,
    review_count: i32,
    last_reviewed_at: Option<DateTime<Utc>>,
    next_review_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FlashcardRow> for Flashcard {
    fn from(row: FlashcardRow) -> Self {
        Flashcard {
            id: row.id,
            owner_id: row.owner_id,
            category_id: row.category_id,
            front: row.front,
            back: row.back,
            tags: row.tags,
            confidence: row.confidence,
            review_count: row.review_count,
            last_reviewed_at: row.last_reviewed_at,
            next_review_at: row.next_review_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    color: Option<String>,
    card_count: i64,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for FlashcardCategory {
    fn from(row: CategoryRow) -> Self {
        FlashcardCategory {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            color: row.color,
            card_count: row.card_count,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    category_id: Option<Uuid>,
    cards_studied: i32,
    correct_count: i32,
    duration_secs: i32,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl From<SessionRow> for FlashcardSession {
    fn from(row: SessionRow) -> Self {
        FlashcardSession {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            cards_studied: row.cards_studied,
            correct_count: row.correct_count,
            duration_secs: row.duration_secs,
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.owner_id, c.name, c.description, c.color, c.created_at,
           (SELECT COUNT(*) FROM flashcards f WHERE f.category_id = c.id) AS card_count
    FROM flashcard_categories c
"#;

impl FlashcardRepository {
    /// Reject a category id that does not belong to `owner_id`.
    async fn check_category(
        &self,
        owner_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM flashcard_categories WHERE id = $1 AND owner_id = $2)",
        )
        .bind(category_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        if !exists {
            return Err(AppError::Validation(format!(
                "Unknown category {category_id}"
            )));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        draft: &FlashcardDraft,
    ) -> Result<Flashcard, AppError> {
        self.check_category(owner_id, draft.category_id).await?;

        let row = sqlx::query_as::<_, FlashcardRow>(
            r#"
            INSERT INTO flashcards (owner_id, category_id, front, back, tags)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(draft.category_id)
        .bind(&draft.front)
        .bind(&draft.back)
        .bind(&draft.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Flashcard>, AppError> {
        let row = sqlx::query_as::<_, FlashcardRow>("SELECT * FROM flashcards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// The owner's cards; due cards (never reviewed first) when `due_only`.
    pub async fn list(
        &self,
        owner_id: Uuid,
        filter: &FlashcardFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Flashcard>, AppError> {
        let rows = sqlx::query_as::<_, FlashcardRow>(
            r#"
            SELECT * FROM flashcards
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR category_id = $2)
              AND (NOT $3 OR next_review_at IS NULL OR next_review_at <= $4)
            ORDER BY
              CASE WHEN $3 THEN next_review_at END ASC NULLS FIRST,
              created_at DESC
            LIMIT $5
            "#,
        )
        .bind(owner_id)
        .bind(filter.category_id)
        .bind(filter.due_only)
        .bind(now)
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace card content. Review history is kept.
    pub async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        draft: &FlashcardDraft,
    ) -> Result<Option<Flashcard>, AppError> {
        self.check_category(owner_id, draft.category_id).await?;

        let row = sqlx::query_as::<_, FlashcardRow>(
            r#"
            UPDATE flashcards
            SET category_id = $3, front = $4, back = $5, tags = $6, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(draft.category_id)
        .bind(&draft.front)
        .bind(&draft.back)
        .bind(&draft.tags)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    /// Store a review result and schedule the next review.
    pub async fn record_confidence(
        &self,
        id: Uuid,
        owner_id: Uuid,
        confidence: Confidence,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Option<Flashcard>, AppError> {
        let row = sqlx::query_as::<_, FlashcardRow>(
            r#"
            UPDATE flashcards
            SET confidence = $3, review_count = review_count + 1,
                last_reviewed_at = $4, next_review_at = $5, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(confidence.value())
        .bind(reviewed_at)
        .bind(confidence.next_review_at(reviewed_at))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    // -- Categories --

    pub async fn create_category(
        &self,
        owner_id: Uuid,
        draft: &CategoryDraft,
    ) -> Result<FlashcardCategory, AppError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO flashcard_categories (owner_id, name, description, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, name, description, color, created_at, 0::BIGINT AS card_count
            "#,
        )
        .bind(owner_id)
        .bind(draft.name.trim())
        .bind(&draft.description)
        .bind(&draft.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_err(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Category '{}' already exists", draft.name.trim()))
            }
            other => other,
        })?;

        Ok(row.into())
    }

    pub async fn list_categories(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<FlashcardCategory>, AppError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_SELECT} WHERE c.owner_id = $1 ORDER BY c.name"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Option<FlashcardCategory>, AppError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        owner_id: Uuid,
        draft: &CategoryDraft,
    ) -> Result<Option<FlashcardCategory>, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE flashcard_categories
            SET name = $3, description = $4, color = $5
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(draft.name.trim())
        .bind(&draft.description)
        .bind(&draft.color)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_category(id).await
    }

    /// Delete a category; its cards become uncategorized.
    pub async fn delete_category(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM flashcard_categories WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    // -- Study sessions --

    pub async fn create_session(
        &self,
        user_id: Uuid,
        session: &NewFlashcardSession,
        ended_at: DateTime<Utc>,
    ) -> Result<FlashcardSession, AppError> {
        self.check_category(user_id, session.category_id).await?;

        let started_at = ended_at - TimeDelta::seconds(session.duration_secs as i64);
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO flashcard_sessions (user_id, category_id, cards_studied, correct_count,
                                            duration_secs, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(session.category_id)
        .bind(session.cards_studied)
        .bind(session.correct_count)
        .bind(session.duration_secs)
        .bind(started_at)
        .bind(ended_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<FlashcardSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM flashcard_sessions
            WHERE user_id = $1
            ORDER BY ended_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
