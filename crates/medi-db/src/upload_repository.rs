use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use medi_core::error::AppError;
use medi_core::upload::Upload;

use crate::database::db_err;

/// Metadata of uploaded files. The bytes live on disk.
#[derive(Clone)]
pub struct UploadRepository {
    pool: PgPool,
}

impl UploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UploadRow {
    id: Uuid,
    owner_id: Uuid,
    original_name: String,
    stored_name: String,
    content_type: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

impl From<UploadRow> for Upload {
    fn from(row: UploadRow) -> Self {
        Upload {
            id: row.id,
            owner_id: row.owner_id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            created_at: row.created_at,
        }
    }
}

impl UploadRepository {
    pub async fn create(
        &self,
        id: Uuid,
        owner_id: Uuid,
        original_name: &str,
        stored_name: &str,
        content_type: &str,
        size_bytes: i64,
    ) -> Result<Upload, AppError> {
        let row = sqlx::query_as::<_, UploadRow>(
            r#"
            INSERT INTO uploads (id, owner_id, original_name, stored_name, content_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(original_name)
        .bind(stored_name)
        .bind(content_type)
        .bind(size_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Upload>, AppError> {
        let row = sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// Delete the metadata row, returning it so the caller can remove the file.
    pub async fn delete(&self, id: Uuid) -> Result<Option<Upload>, AppError> {
        let row = sqlx::query_as::<_, UploadRow>("DELETE FROM uploads WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }
}
