use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use medi_core::case::{Case, CaseDraft, CaseFilter, CaseRating};
use medi_core::error::AppError;
use medi_core::gamification::ProgressEvent;
use medi_core::rating::RatingAggregate;

use crate::database::db_err;
use crate::user_repository::{ProgressOutcome, apply_progress};

/// Clinical cases and their ratings.
#[derive(Clone)]
pub struct CaseRepository {
    pool: PgPool,
}

/// Result of a rating upsert.
#[derive(Debug, Clone)]
pub struct RatingOutcome {
    pub rating: CaseRating,
    pub aggregate: RatingAggregate,
    /// `true` when this was the user's first rating of the case.
    pub created: bool,
    /// XP awarded for a first rating, committed with the rating itself.
    pub progress: Option<ProgressOutcome>,
}

impl CaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CaseRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    specialty: String,
    difficulty: String,
    summary: String,
    presentation: String,
    history: Option<String>,
    examination: Option<String>,
    investigations: Option<String>,
    diagnosis: Option<String>,
    management: Option<String>,
    tags: Vec<String>,
    published: bool,
    view_count: i64,
    rating_sum: i64,
    rating_count: i64,
    rating_avg: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CaseRow> for Case {
    fn from(row: CaseRow) -> Self {
        Case {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            specialty: row.specialty,
            difficulty: row.difficulty.parse().unwrap_or_default(),
            summary: row.summary,
            presentation: row.presentation,
            history: row.history,
            examination: row.examination,
            investigations: row.investigations,
            diagnosis: row.diagnosis,
            management: row.management,
            tags: row.tags,
            published: row.published,
            view_count: row.view_count,
            rating_sum: row.rating_sum,
            rating_count: row.rating_count,
            rating_avg: row.rating_avg,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: Uuid,
    case_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for CaseRating {
    fn from(row: RatingRow) -> Self {
        CaseRating {
            id: row.id,
            case_id: row.case_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CaseRepository {
    pub async fn create(&self, author_id: Uuid, draft: &CaseDraft) -> Result<Case, AppError> {
        let row = sqlx::query_as::<_, CaseRow>(
            r#"
            INSERT INTO cases (author_id, title, specialty, difficulty, summary, presentation,
                               history, examination, investigations, diagnosis, management,
                               tags, published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.specialty)
        .bind(draft.difficulty.as_str())
        .bind(&draft.summary)
        .bind(&draft.presentation)
        .bind(&draft.history)
        .bind(&draft.examination)
        .bind(&draft.investigations)
        .bind(&draft.diagnosis)
        .bind(&draft.management)
        .bind(&draft.tags)
        .bind(draft.published)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::info!(case_id = %row.id, %author_id, "Case created");
        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Case>, AppError> {
        let row = sqlx::query_as::<_, CaseRow>("SELECT * FROM cases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// Cases visible to `viewer_id`, newest first.
    pub async fn list(
        &self,
        filter: &CaseFilter,
        viewer_id: Uuid,
        is_admin: bool,
    ) -> Result<Vec<Case>, AppError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query_as::<_, CaseRow>(
            r#"
            SELECT * FROM cases
            WHERE (published OR author_id = $1 OR $2)
              AND ($3::text IS NULL OR LOWER(specialty) = LOWER($3))
              AND ($4::text IS NULL OR difficulty = $4)
              AND ($5::text IS NULL OR title ILIKE $5 OR summary ILIKE $5 OR $6 = ANY(tags))
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(viewer_id)
        .bind(is_admin)
        .bind(&filter.specialty)
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(&search)
        .bind(filter.search.as_deref().map(str::trim).unwrap_or_default())
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace the editable fields of a case. Rating and view counters are kept.
    pub async fn update(&self, id: Uuid, draft: &CaseDraft) -> Result<Option<Case>, AppError> {
        let row = sqlx::query_as::<_, CaseRow>(
            r#"
            UPDATE cases
            SET title = $2, specialty = $3, difficulty = $4, summary = $5, presentation = $6,
                history = $7, examination = $8, investigations = $9, diagnosis = $10,
                management = $11, tags = $12, published = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.specialty)
        .bind(draft.difficulty.as_str())
        .bind(&draft.summary)
        .bind(&draft.presentation)
        .bind(&draft.history)
        .bind(&draft.examination)
        .bind(&draft.investigations)
        .bind(&draft.diagnosis)
        .bind(&draft.management)
        .bind(&draft.tags)
        .bind(draft.published)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_views(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE cases SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -- Ratings --

    pub async fn get_rating(
        &self,
        case_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CaseRating>, AppError> {
        let row = sqlx::query_as::<_, RatingRow>(
            "SELECT * FROM case_ratings WHERE case_id = $1 AND user_id = $2",
        )
        .bind(case_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// Create or replace the user's rating and update the case aggregate in
    /// one transaction. The case row lock serializes concurrent raters.
    ///
    /// `rating` must already be validated to 1..=5.
    pub async fn rate_case(
        &self,
        case_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: Option<&str>,
        today: NaiveDate,
    ) -> Result<RatingOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let (count, sum): (i64, i64) = sqlx::query_as(
            "SELECT rating_count, rating_sum FROM cases WHERE id = $1 FOR UPDATE",
        )
        .bind(case_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(format!("Case {case_id} not found")))?;

        let previous: Option<i16> = sqlx::query_scalar(
            "SELECT rating FROM case_ratings WHERE case_id = $1 AND user_id = $2",
        )
        .bind(case_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let row = sqlx::query_as::<_, RatingRow>(
            r#"
            INSERT INTO case_ratings (case_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, case_id) DO UPDATE
            SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let aggregate = RatingAggregate::new(count, sum).apply(previous, rating);
        write_aggregate(&mut tx, case_id, &aggregate).await?;

        let progress = match previous {
            None => Some(apply_progress(&mut tx, user_id, &ProgressEvent::CaseRated, today).await?),
            Some(_) => None,
        };

        tx.commit().await.map_err(db_err)?;

        tracing::debug!(%case_id, %user_id, rating, average = aggregate.average(), "Case rated");
        Ok(RatingOutcome {
            rating: row.into(),
            aggregate,
            created: previous.is_none(),
            progress,
        })
    }

    /// Remove the user's rating. Returns `None` if they had not rated the case.
    pub async fn remove_rating(
        &self,
        case_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RatingAggregate>, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let (count, sum): (i64, i64) = sqlx::query_as(
            "SELECT rating_count, rating_sum FROM cases WHERE id = $1 FOR UPDATE",
        )
        .bind(case_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(format!("Case {case_id} not found")))?;

        let removed: Option<i16> = sqlx::query_scalar(
            "DELETE FROM case_ratings WHERE case_id = $1 AND user_id = $2 RETURNING rating",
        )
        .bind(case_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(removed) = removed else {
            return Ok(None);
        };

        let aggregate = RatingAggregate::new(count, sum).remove(removed);
        write_aggregate(&mut tx, case_id, &aggregate).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(aggregate))
    }
}

async fn write_aggregate(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    case_id: Uuid,
    aggregate: &RatingAggregate,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE cases
        SET rating_count = $2, rating_sum = $3, rating_avg = $4
        WHERE id = $1
        "#,
    )
    .bind(case_id)
    .bind(aggregate.count)
    .bind(aggregate.sum)
    .bind(aggregate.average())
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
