use medi_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::case_repository::CaseRepository;
use crate::config::DatabaseConfig;
use crate::flashcard_repository::FlashcardRepository;
use crate::quiz_repository::QuizRepository;
use crate::stats_repository::StatsRepository;
use crate::upload_repository::UploadRepository;
use crate::user_repository::UserRepository;

/// Owns the connection pool, runs migrations, and vends repositories.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn case_repo(&self) -> CaseRepository {
        CaseRepository::new(self.pool.clone())
    }

    pub fn quiz_repo(&self) -> QuizRepository {
        QuizRepository::new(self.pool.clone())
    }

    pub fn flashcard_repo(&self) -> FlashcardRepository {
        FlashcardRepository::new(self.pool.clone())
    }

    pub fn stats_repo(&self) -> StatsRepository {
        StatsRepository::new(self.pool.clone())
    }

    pub fn upload_repo(&self) -> UploadRepository {
        UploadRepository::new(self.pool.clone())
    }

    /// Round-trip a trivial query; used by the health check.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a sqlx error to `AppError`. Unique and foreign-key violations are
/// client errors; everything else is a database failure.
pub(crate) fn db_err(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return AppError::Conflict(
                db.constraint()
                    .map(|c| format!("duplicate value violates {c}"))
                    .unwrap_or_else(|| "duplicate value".into()),
            );
        }
        if db.is_foreign_key_violation() {
            return AppError::Validation("referenced record does not exist".into());
        }
    }
    AppError::DatabaseError(e.to_string())
}
