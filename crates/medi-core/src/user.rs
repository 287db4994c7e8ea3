use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Access level of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Educator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Educator => "educator",
            Role::Admin => "admin",
        }
    }

    /// Educators and admins may author clinical cases.
    pub fn can_author_cases(&self) -> bool {
        matches!(self, Role::Educator | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A registered user with profile and gamification counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Subject id issued by the external identity service.
    pub identity_uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Role,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
    pub last_active_date: Option<NaiveDate>,
    pub study_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True if this user may modify a resource authored by `owner_id`.
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.role.is_admin()
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.display_name {
            let len = name.trim().chars().count();
            if len == 0 || len > 80 {
                return Err(AppError::Validation(
                    "display_name must be between 1 and 80 characters".into(),
                ));
            }
        }
        if self.bio.as_ref().is_some_and(|b| b.chars().count() > 2000) {
            return Err(AppError::Validation(
                "bio must be at most 2000 characters".into(),
            ));
        }
        if self.specialty.as_ref().is_some_and(|s| s.chars().count() > 120) {
            return Err(AppError::Validation(
                "specialty must be at most 120 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Identity asserted by the external identity service for a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

/// A server-side login session. The raw token is never stored.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A row from the user's activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub xp: i32,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard line.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
}
