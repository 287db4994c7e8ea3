use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medi_core::AppError;
use medi_core::case::{Case, CaseDraft, CaseRating};
use medi_core::flashcard::{
    CategoryDraft, Flashcard, FlashcardCategory, FlashcardDraft, FlashcardSession,
    NewFlashcardSession,
};
use medi_core::gamification::{Achievement, UnlockedAchievement, xp_for_level};
use medi_core::models::Difficulty;
use medi_core::quiz::{Question, QuestionOutcome, Quiz, QuizAnalytics, QuizAttempt, QuizDraft};
use medi_core::rating::RatingAggregate;
use medi_core::stats::UserStats;
use medi_core::traits::{ChatMessage, ChatRole};
use medi_core::upload::Upload;
use medi_core::user::{Activity, LeaderboardEntry, ProfileUpdate, User};
use medi_db::ProgressOutcome;

fn parse_difficulty(value: Option<&str>) -> Result<Option<Difficulty>, AppError> {
    value
        .map(|d| d.parse::<Difficulty>().map_err(AppError::Validation))
        .transpose()
}

// ---------------------------------------------------------------------------
// Auth & users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    /// ID token issued by the identity service after sign-in
    pub id_token: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    /// Opaque session token. Also set as the `medi_session` cookie.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: String,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
    pub last_active_date: Option<NaiveDate>,
    pub study_minutes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            role: u.role.to_string(),
            specialty: u.specialty,
            bio: u.bio,
            avatar_url: u.avatar_url,
            xp: u.xp,
            level: u.level,
            streak_days: u.streak_days,
            last_active_date: u.last_active_date,
            study_minutes: u.study_minutes,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(r: UpdateProfileRequest) -> Self {
        Self {
            display_name: r.display_name,
            specialty: r.specialty,
            bio: r.bio,
            avatar_url: r.avatar_url,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AchievementResponse {
    pub code: String,
    pub title: String,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl From<UnlockedAchievement> for AchievementResponse {
    fn from(a: UnlockedAchievement) -> Self {
        Self {
            code: a.code,
            title: a.title,
            unlocked_at: Some(a.unlocked_at),
        }
    }
}

impl From<Achievement> for AchievementResponse {
    fn from(a: Achievement) -> Self {
        Self {
            code: a.code().to_string(),
            title: a.title().to_string(),
            unlocked_at: None,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProgressResponse {
    pub xp: i64,
    pub level: i32,
    /// Total XP at which the next level starts
    pub next_level_xp: i64,
    pub streak_days: i32,
    pub last_active_date: Option<NaiveDate>,
    pub study_minutes: i64,
    pub achievements: Vec<AchievementResponse>,
}

impl ProgressResponse {
    pub fn new(user: &User, achievements: Vec<UnlockedAchievement>) -> Self {
        Self {
            xp: user.xp,
            level: user.level,
            next_level_xp: xp_for_level(user.level + 1),
            streak_days: user.streak_days,
            last_active_date: user.last_active_date,
            study_minutes: user.study_minutes,
            achievements: achievements.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AwardXpRequest {
    pub amount: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StudyTimeRequest {
    pub minutes: i32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProgressUpdateResponse {
    pub xp_gained: i32,
    pub xp: i64,
    pub level: i32,
    pub leveled_up: bool,
    pub streak_days: i32,
    /// Achievements unlocked by this event
    pub unlocked: Vec<AchievementResponse>,
}

impl From<ProgressOutcome> for ProgressUpdateResponse {
    fn from(o: ProgressOutcome) -> Self {
        Self {
            xp_gained: o.update.xp_gained,
            xp: o.update.xp,
            level: o.update.level,
            leveled_up: o.update.leveled_up,
            streak_days: o.update.streak_days,
            unlocked: o.unlocked.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActivityResponse {
    pub id: Uuid,
    pub kind: String,
    pub xp: i32,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        Self {
            id: a.id,
            kind: a.kind,
            xp: a.xp,
            detail: a.detail,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityResponse>,
    /// Number of items in this page.
    pub count: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LeaderboardEntryResponse {
    pub rank: usize,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntryResponse>,
}

impl From<Vec<LeaderboardEntry>> for LeaderboardResponse {
    fn from(entries: Vec<LeaderboardEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .enumerate()
                .map(|(i, e)| LeaderboardEntryResponse {
                    rank: i + 1,
                    user_id: e.user_id,
                    display_name: e.display_name,
                    xp: e.xp,
                    level: e.level,
                    streak_days: e.streak_days,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_cards: i64,
    pub due_cards: i64,
    pub mastered_cards: i64,
    pub average_confidence: f64,
    pub session_count: i64,
    pub cards_studied: i64,
    pub total_study_secs: i64,
    /// Percentage of correct answers across flashcard sessions
    pub session_accuracy: f64,
    pub quiz_attempts: i64,
    pub average_quiz_score: f64,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
    /// When these numbers were computed; may be up to the cache TTL old
    pub computed_at: DateTime<Utc>,
}

impl From<&UserStats> for StatsResponse {
    fn from(s: &UserStats) -> Self {
        Self {
            total_cards: s.total_cards,
            due_cards: s.due_cards,
            mastered_cards: s.mastered_cards,
            average_confidence: s.average_confidence,
            session_count: s.session_count,
            cards_studied: s.cards_studied,
            total_study_secs: s.total_study_secs,
            session_accuracy: s.session_accuracy,
            quiz_attempts: s.quiz_attempts,
            average_quiz_score: s.average_quiz_score,
            xp: s.xp,
            level: s.level,
            streak_days: s.streak_days,
            computed_at: s.computed_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Cases
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CaseRequest {
    pub title: String,
    pub specialty: String,
    /// beginner, intermediate (default), or advanced
    pub difficulty: Option<String>,
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

impl TryFrom<CaseRequest> for CaseDraft {
    type Error = AppError;

    fn try_from(r: CaseRequest) -> Result<Self, Self::Error> {
        let draft = CaseDraft {
            difficulty: parse_difficulty(r.difficulty.as_deref())?.unwrap_or_default(),
            title: r.title,
            specialty: r.specialty,
            summary: r.summary,
            presentation: r.presentation,
            history: r.history,
            examination: r.examination,
            investigations: r.investigations,
            diagnosis: r.diagnosis,
            management: r.management,
            tags: r.tags,
            published: r.published,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CaseResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub specialty: String,
    pub difficulty: String,
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
    pub rating_count: i64,
    pub rating_avg: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Case> for CaseResponse {
    fn from(c: Case) -> Self {
        Self {
            id: c.id,
            author_id: c.author_id,
            title: c.title,
            specialty: c.specialty,
            difficulty: c.difficulty.to_string(),
            summary: c.summary,
            presentation: c.presentation,
            history: c.history,
            examination: c.examination,
            investigations: c.investigations,
            diagnosis: c.diagnosis,
            management: c.management,
            tags: c.tags,
            published: c.published,
            view_count: c.view_count,
            rating_count: c.rating_count,
            rating_avg: c.rating_avg,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CaseListResponse {
    pub cases: Vec<CaseResponse>,
    /// Number of items in this page.
    pub count: usize,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListCasesQuery {
    pub specialty: Option<String>,
    pub difficulty: Option<String>,
    /// Matches title or summary, or an exact tag
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListCasesQuery {
    pub fn difficulty(&self) -> Result<Option<Difficulty>, AppError> {
        parse_difficulty(self.difficulty.as_deref())
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RateCaseRequest {
    /// 1 to 5 stars
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RatingResponse {
    pub case_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<CaseRating> for RatingResponse {
    fn from(r: CaseRating) -> Self {
        Self {
            case_id: r.case_id,
            rating: r.rating,
            comment: r.comment,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RatingSummaryResponse {
    pub rating_count: i64,
    pub rating_avg: f64,
}

impl From<RatingAggregate> for RatingSummaryResponse {
    fn from(a: RatingAggregate) -> Self {
        Self {
            rating_count: a.count,
            rating_avg: a.average(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RateCaseResponse {
    pub rating: RatingResponse,
    pub summary: RatingSummaryResponse,
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QuestionDto {
    pub prompt: String,
    pub options: Vec<String>,
    /// Hidden from users who do not own the quiz
    pub correct_index: Option<usize>,
    pub explanation: Option<String>,
}

impl QuestionDto {
    fn from_question(q: Question, reveal: bool) -> Self {
        Self {
            prompt: q.prompt,
            options: q.options,
            correct_index: reveal.then_some(q.correct_index),
            explanation: if reveal { q.explanation } else { None },
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct QuizRequest {
    pub title: String,
    pub topic: String,
    pub difficulty: Option<String>,
    pub case_id: Option<Uuid>,
    pub questions: Vec<QuestionDto>,
    #[serde(default)]
    pub is_public: bool,
    pub time_limit_secs: Option<i32>,
}

impl TryFrom<QuizRequest> for QuizDraft {
    type Error = AppError;

    fn try_from(r: QuizRequest) -> Result<Self, Self::Error> {
        let questions = r
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                let correct_index = q.correct_index.ok_or_else(|| {
                    AppError::Validation(format!("question {}: correct_index is required", i + 1))
                })?;
                Ok(Question {
                    prompt: q.prompt,
                    options: q.options,
                    correct_index,
                    explanation: q.explanation,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let draft = QuizDraft {
            difficulty: parse_difficulty(r.difficulty.as_deref())?.unwrap_or_default(),
            title: r.title,
            topic: r.topic,
            case_id: r.case_id,
            questions,
            is_public: r.is_public,
            time_limit_secs: r.time_limit_secs,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuizResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub topic: String,
    pub difficulty: String,
    pub case_id: Option<Uuid>,
    pub source: String,
    pub is_public: bool,
    pub time_limit_secs: Option<i32>,
    pub question_count: usize,
    pub questions: Vec<QuestionDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuizResponse {
    /// Answers and explanations are only included for the quiz owner.
    pub fn for_viewer(q: Quiz, viewer_id: Uuid) -> Self {
        let reveal = q.owner_id == viewer_id;
        Self {
            id: q.id,
            owner_id: q.owner_id,
            title: q.title,
            topic: q.topic,
            difficulty: q.difficulty.to_string(),
            case_id: q.case_id,
            source: q.source.to_string(),
            is_public: q.is_public,
            time_limit_secs: q.time_limit_secs,
            question_count: q.questions.len(),
            questions: q
                .questions
                .into_iter()
                .map(|question| QuestionDto::from_question(question, reveal))
                .collect(),
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuizListResponse {
    pub quizzes: Vec<QuizResponse>,
    /// Number of items in this page.
    pub count: usize,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListQuizzesQuery {
    /// Only quizzes owned by the caller
    #[serde(default)]
    pub mine: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GenerateQuizRequest {
    pub topic: String,
    pub difficulty: Option<String>,
    /// Number of questions (1-20, default 5)
    pub question_count: Option<usize>,
    /// Ground the questions in a clinical case
    pub case_id: Option<Uuid>,
    pub title: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl GenerateQuizRequest {
    pub fn difficulty(&self) -> Result<Difficulty, AppError> {
        Ok(parse_difficulty(self.difficulty.as_deref())?.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitAttemptRequest {
    /// Selected option per question; null for unanswered
    pub answers: Vec<Option<usize>>,
    #[serde(default)]
    pub duration_secs: i32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuestionOutcomeResponse {
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

impl From<QuestionOutcome> for QuestionOutcomeResponse {
    fn from(o: QuestionOutcome) -> Self {
        Self {
            selected: o.selected,
            correct_index: o.correct_index,
            is_correct: o.is_correct,
            explanation: o.explanation,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptResultResponse {
    pub attempt: AttemptResponse,
    pub outcomes: Vec<QuestionOutcomeResponse>,
    pub progress: ProgressUpdateResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptResponse {
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

impl From<QuizAttempt> for AttemptResponse {
    fn from(a: QuizAttempt) -> Self {
        Self {
            id: a.id,
            quiz_id: a.quiz_id,
            user_id: a.user_id,
            answers: a.answers,
            correct_count: a.correct_count,
            total_questions: a.total_questions,
            score: a.score,
            duration_secs: a.duration_secs,
            xp_awarded: a.xp_awarded,
            completed_at: a.completed_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptListResponse {
    pub attempts: Vec<AttemptResponse>,
    /// Number of items in this page.
    pub count: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnalyticsResponse {
    pub quiz_id: Uuid,
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
    /// Fraction of attempts answering each question correctly
    pub question_correct_rates: Vec<f64>,
}

impl AnalyticsResponse {
    pub fn new(quiz_id: Uuid, a: QuizAnalytics) -> Self {
        Self {
            quiz_id,
            attempt_count: a.attempt_count,
            unique_participants: a.unique_participants,
            average_score: a.average_score,
            median_score: a.median_score,
            min_score: a.min_score,
            max_score: a.max_score,
            p25_score: a.p25_score,
            p75_score: a.p75_score,
            p90_score: a.p90_score,
            average_duration_secs: a.average_duration_secs,
            question_correct_rates: a.question_correct_rates,
        }
    }
}

// ---------------------------------------------------------------------------
// Flashcards
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FlashcardRequest {
    pub category_id: Option<Uuid>,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TryFrom<FlashcardRequest> for FlashcardDraft {
    type Error = AppError;

    fn try_from(r: FlashcardRequest) -> Result<Self, Self::Error> {
        let draft = FlashcardDraft {
            category_id: r.category_id,
            front: r.front,
            back: r.back,
            tags: r.tags,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FlashcardResponse {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    /// 0 until the first review, then 1-5
    pub confidence: i16,
    pub review_count: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(f: Flashcard) -> Self {
        Self {
            id: f.id,
            category_id: f.category_id,
            front: f.front,
            back: f.back,
            tags: f.tags,
            confidence: f.confidence,
            review_count: f.review_count,
            last_reviewed_at: f.last_reviewed_at,
            next_review_at: f.next_review_at,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FlashcardListResponse {
    pub flashcards: Vec<FlashcardResponse>,
    /// Number of items in this page.
    pub count: usize,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListFlashcardsQuery {
    pub category_id: Option<Uuid>,
    /// Only cards that are new or due for review
    #[serde(default)]
    pub due: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ConfidenceRequest {
    /// 1 (no idea) to 5 (perfect recall)
    pub confidence: i32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    /// Hex color like `#3366ff`
    pub color: Option<String>,
}

impl TryFrom<CategoryRequest> for CategoryDraft {
    type Error = AppError;

    fn try_from(r: CategoryRequest) -> Result<Self, Self::Error> {
        let draft = CategoryDraft {
            name: r.name,
            description: r.description,
            color: r.color,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<FlashcardCategory> for CategoryResponse {
    fn from(c: FlashcardCategory) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            color: c.color,
            card_count: c.card_count,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FlashcardSessionRequest {
    pub category_id: Option<Uuid>,
    pub cards_studied: i32,
    pub correct_count: i32,
    pub duration_secs: i32,
}

impl TryFrom<FlashcardSessionRequest> for NewFlashcardSession {
    type Error = AppError;

    fn try_from(r: FlashcardSessionRequest) -> Result<Self, Self::Error> {
        let session = NewFlashcardSession {
            category_id: r.category_id,
            cards_studied: r.cards_studied,
            correct_count: r.correct_count,
            duration_secs: r.duration_secs,
        };
        session.validate()?;
        Ok(session)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FlashcardSessionResponse {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub cards_studied: i32,
    pub correct_count: i32,
    pub duration_secs: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl From<FlashcardSession> for FlashcardSessionResponse {
    fn from(s: FlashcardSession) -> Self {
        Self {
            id: s.id,
            category_id: s.category_id,
            cards_studied: s.cards_studied,
            correct_count: s.correct_count,
            duration_secs: s.duration_secs,
            started_at: s.started_at,
            ended_at: s.ended_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordSessionResponse {
    pub session: FlashcardSessionResponse,
    pub progress: ProgressUpdateResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<FlashcardSessionResponse>,
    /// Number of items in this page.
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Path to fetch the stored file
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<Upload> for UploadResponse {
    fn from(u: Upload) -> Self {
        Self {
            url: format!("/v1/uploads/{}", u.id),
            id: u.id,
            original_name: u.original_name,
            content_type: u.content_type,
            size_bytes: u.size_bytes,
            created_at: u.created_at,
        }
    }
}

/// Multipart form for `POST /v1/uploads`. Documentation only.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatMessageDto {
    /// user or assistant
    pub role: String,
    pub content: String,
}

impl TryFrom<ChatMessageDto> for ChatMessage {
    type Error = AppError;

    fn try_from(m: ChatMessageDto) -> Result<Self, Self::Error> {
        let role = match m.role.as_str() {
            "user" => ChatRole::User,
            "assistant" => ChatRole::Assistant,
            "system" => ChatRole::System,
            other => {
                return Err(AppError::Validation(format!("Unknown message role: {other}")));
            }
        };
        Ok(ChatMessage {
            role,
            content: m.content,
        })
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessageDto>,
    /// Discuss this clinical case
    pub case_id: Option<Uuid>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GenerateTextRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Ask the model for a JSON object
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GenerateTextResponse {
    pub text: String,
    pub model: String,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
