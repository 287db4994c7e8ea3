use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use medi_core::error::AppError;
use medi_core::gamification::{
    Achievement, AchievementContext, Progress, ProgressEvent, ProgressUpdate,
    UnlockedAchievement, evaluate,
};
use medi_core::user::{
    Activity, AuthSession, LeaderboardEntry, ProfileUpdate, Role, User, VerifiedIdentity,
};

use crate::database::db_err;

/// Users, login sessions, and gamification counters.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

/// Result of recording one progress event.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub update: ProgressUpdate,
    pub unlocked: Vec<Achievement>,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    identity_uid: String,
    email: Option<String>,
    display_name: Option<String>,
    role: String,
    specialty: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    xp: i64,
    level: i32,
    streak_days: i32,
    last_active_date: Option<NaiveDate>,
    study_minutes: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            identity_uid: row.identity_uid,
            email: row.email,
            display_name: row.display_name,
            role: row.role.parse().unwrap_or_default(),
            specialty: row.specialty,
            bio: row.bio,
            avatar_url: row.avatar_url,
            xp: row.xp,
            level: row.level,
            streak_days: row.streak_days,
            last_active_date: row.last_active_date,
            study_minutes: row.study_minutes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for AuthSession {
    fn from(row: SessionRow) -> Self {
        AuthSession {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    xp: i32,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            xp: row.xp,
            detail: row.detail,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProgressRow {
    xp: i64,
    level: i32,
    streak_days: i32,
    last_active_date: Option<NaiveDate>,
}

#[derive(sqlx::FromRow)]
struct CountersRow {
    quiz_attempts: i64,
    perfect_quizzes: i64,
    cards_reviewed: i64,
    cases_rated: i64,
}

impl UserRepository {
    /// Create the user for a verified identity, or refresh the email of an
    /// existing one. Profile fields the user has edited are left alone.
    pub async fn upsert_identity(&self, identity: &VerifiedIdentity) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (identity_uid, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_uid) DO UPDATE
            SET email = COALESCE(EXCLUDED.email, users.email),
                display_name = COALESCE(users.display_name, EXCLUDED.display_name),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&identity.uid)
        .bind(&identity.email)
        .bind(&identity.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) ORDER BY created_at LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                specialty = COALESCE($3, specialty),
                bio = COALESCE($4, bio),
                avatar_url = COALESCE($5, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.display_name)
        .bind(&update.specialty)
        .bind(&update.bio)
        .bind(&update.avatar_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    pub async fn set_role(&self, email: &str, role: Role) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET role = $2, updated_at = NOW()
            WHERE id = (
                SELECT id FROM users WHERE LOWER(email) = LOWER($1)
                ORDER BY created_at LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("No user with email {email}")))
    }

    // -- Sessions --

    pub async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AuthSession, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO auth_sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    /// The owner of a live (unexpired) session.
    pub async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.* FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete sessions that expired before `now`. Returns how many were removed.
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    // -- Progress --

    /// Apply a progress event atomically: lock the user row, update XP,
    /// level and streak, append to the activity feed, and unlock any newly
    /// earned achievements.
    pub async fn record_progress(
        &self,
        user_id: Uuid,
        event: &ProgressEvent,
        today: NaiveDate,
    ) -> Result<ProgressOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let outcome = apply_progress(&mut tx, user_id, event, today).await?;
        tx.commit().await.map_err(db_err)?;

        if outcome.update.leveled_up {
            tracing::info!(%user_id, level = outcome.update.level, "User leveled up");
        }
        Ok(outcome)
    }

    pub async fn list_activity(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Activity>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT * FROM user_activities
            WHERE user_id = $1
            ORDER BY created_at DESC
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

    pub async fn list_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UnlockedAchievement>, AppError> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT code, unlocked_at FROM user_achievements WHERE user_id = $1 ORDER BY unlocked_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(code, at)| UnlockedAchievement::new(&code, at))
            .collect())
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let rows: Vec<(Uuid, Option<String>, i64, i32, i32)> = sqlx::query_as(
            r#"
            SELECT id, display_name, xp, level, streak_days
            FROM users
            ORDER BY xp DESC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, display_name, xp, level, streak_days)| LeaderboardEntry {
                    user_id,
                    display_name,
                    xp,
                    level,
                    streak_days,
                },
            )
            .collect())
    }
}

/// Insert every achievement whose condition now holds; returns the ones
/// that were not already unlocked.
/// Progress update inside a caller's transaction. The user row stays
/// locked until that transaction ends.
pub(crate) async fn apply_progress(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    event: &ProgressEvent,
    today: NaiveDate,
) -> Result<ProgressOutcome, AppError> {
    let current = sqlx::query_as::<_, ProgressRow>(
        r#"
        SELECT xp, level, streak_days, last_active_date
        FROM users WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?
    .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    let progress = Progress {
        xp: current.xp,
        level: current.level,
        streak_days: current.streak_days,
        last_active_date: current.last_active_date,
    };
    let update = progress.apply(event, today);

    sqlx::query(
        r#"
        UPDATE users
        SET xp = $2, level = $3, streak_days = $4, last_active_date = $5,
            study_minutes = study_minutes + $6, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(update.xp)
    .bind(update.level)
    .bind(update.streak_days)
    .bind(update.last_active_date)
    .bind(event.study_minutes())
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    sqlx::query(
        r#"
        INSERT INTO user_activities (user_id, kind, xp, detail)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(event.kind())
    .bind(update.xp_gained)
    .bind(event.detail())
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    let unlocked = unlock_achievements(tx, user_id, &update).await?;
    Ok(ProgressOutcome { update, unlocked })
}

async fn unlock_achievements(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    update: &ProgressUpdate,
) -> Result<Vec<Achievement>, AppError> {
    let counters = sqlx::query_as::<_, CountersRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1) AS quiz_attempts,
            (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND score >= 100) AS perfect_quizzes,
            (SELECT COALESCE(SUM(cards_studied), 0)::BIGINT FROM flashcard_sessions WHERE user_id = $1) AS cards_reviewed,
            (SELECT COUNT(*) FROM case_ratings WHERE user_id = $1) AS cases_rated
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_err)?;

    let ctx = AchievementContext {
        quiz_attempts: counters.quiz_attempts,
        perfect_quizzes: counters.perfect_quizzes,
        cards_reviewed: counters.cards_reviewed,
        cases_rated: counters.cases_rated,
        streak_days: update.streak_days,
        level: update.level,
    };

    let mut unlocked = Vec::new();
    for achievement in evaluate(&ctx) {
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, code)
            VALUES ($1, $2)
            ON CONFLICT (user_id, code) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement.code())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        if inserted.rows_affected() > 0 {
            tracing::info!(%user_id, code = achievement.code(), "Achievement unlocked");
            unlocked.push(achievement);
        }
    }
    Ok(unlocked)
}
