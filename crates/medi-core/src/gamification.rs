//! XP, levels, streaks, and achievements.
//!
//! All rules are fixed tables and integer arithmetic. The database layer
//! loads a [`Progress`] under a row lock, calls [`Progress::apply`], and
//! writes the result back in the same transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::AppError;

const XP_PER_LEVEL_UNIT: i64 = 100;
const MAX_MANUAL_XP: i32 = 1000;
const MAX_FLASHCARD_XP: i32 = 200;
const MAX_STUDY_MINUTES_XP: i32 = 120;

/// Something the user did that earns XP.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    QuizCompleted { score: f64, correct: u32 },
    FlashcardsReviewed { cards: u32 },
    CaseRated,
    StudyTime { minutes: u32 },
    Manual { amount: i32, reason: String },
}

impl ProgressEvent {
    /// Activity-feed kind for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::QuizCompleted { .. } => "quiz_completed",
            ProgressEvent::FlashcardsReviewed { .. } => "flashcards_reviewed",
            ProgressEvent::CaseRated => "case_rated",
            ProgressEvent::StudyTime { .. } => "study_time",
            ProgressEvent::Manual { .. } => "xp_awarded",
        }
    }

    /// XP granted for this event.
    pub fn xp(&self) -> i32 {
        match self {
            ProgressEvent::QuizCompleted { score, correct } => {
                let perfect_bonus = if *score >= 100.0 { 25 } else { 0 };
                10 + 2 * (*correct as i32) + perfect_bonus
            }
            ProgressEvent::FlashcardsReviewed { cards } => {
                (2 * (*cards).min(MAX_FLASHCARD_XP as u32) as i32).min(MAX_FLASHCARD_XP)
            }
            ProgressEvent::CaseRated => 5,
            ProgressEvent::StudyTime { minutes } => {
                (*minutes).min(MAX_STUDY_MINUTES_XP as u32) as i32
            }
            ProgressEvent::Manual { amount, .. } => *amount,
        }
    }

    /// Minutes of study time carried by this event.
    pub fn study_minutes(&self) -> i64 {
        match self {
            ProgressEvent::StudyTime { minutes } => *minutes as i64,
            _ => 0,
        }
    }

    pub fn detail(&self) -> serde_json::Value {
        match self {
            ProgressEvent::QuizCompleted { score, correct } => {
                serde_json::json!({ "score": score, "correct": correct })
            }
            ProgressEvent::FlashcardsReviewed { cards } => serde_json::json!({ "cards": cards }),
            ProgressEvent::CaseRated => serde_json::json!({}),
            ProgressEvent::StudyTime { minutes } => serde_json::json!({ "minutes": minutes }),
            ProgressEvent::Manual { reason, .. } => serde_json::json!({ "reason": reason }),
        }
    }

    /// Build a manual award, checking the allowed range.
    pub fn manual(amount: i32, reason: impl Into<String>) -> Result<Self, AppError> {
        if !(1..=MAX_MANUAL_XP).contains(&amount) {
            return Err(AppError::Validation(format!(
                "xp amount must be between 1 and {MAX_MANUAL_XP}, got {amount}"
            )));
        }
        Ok(ProgressEvent::Manual {
            amount,
            reason: reason.into(),
        })
    }

    /// Build a study-time event, checking the allowed range.
    pub fn study_time(minutes: i32) -> Result<Self, AppError> {
        if !(1..=24 * 60).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "minutes must be between 1 and 1440, got {minutes}"
            )));
        }
        Ok(ProgressEvent::StudyTime {
            minutes: minutes as u32,
        })
    }
}

/// Level reached with `xp` total experience: `1 + floor(sqrt(xp / 100))`.
pub fn level_for_xp(xp: i64) -> i32 {
    if xp <= 0 {
        return 1;
    }
    let units = xp / XP_PER_LEVEL_UNIT;
    let mut root = (units as f64).sqrt() as i64;
    // Correct float rounding at perfect squares.
    while (root + 1) * (root + 1) <= units {
        root += 1;
    }
    while root * root > units {
        root -= 1;
    }
    1 + root as i32
}

/// Total XP needed to reach `level`.
pub fn xp_for_level(level: i32) -> i64 {
    let steps = (level.max(1) - 1) as i64;
    XP_PER_LEVEL_UNIT * steps * steps
}

/// Gamification counters of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
    pub last_active_date: Option<NaiveDate>,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub xp_gained: i32,
    pub xp: i64,
    pub level: i32,
    pub leveled_up: bool,
    pub streak_days: i32,
    pub last_active_date: NaiveDate,
}

impl Progress {
    /// Streak after activity on `today`.
    pub fn streak_on(&self, today: NaiveDate) -> i32 {
        match self.last_active_date {
            Some(last) if last == today => self.streak_days.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.streak_days + 1,
            // Clock skew backwards keeps the current streak.
            Some(last) if last > today => self.streak_days.max(1),
            _ => 1,
        }
    }

    pub fn apply(&self, event: &ProgressEvent, today: NaiveDate) -> ProgressUpdate {
        let xp_gained = event.xp().max(0);
        let xp = self.xp + xp_gained as i64;
        let level = level_for_xp(xp);
        ProgressUpdate {
            xp_gained,
            xp,
            level,
            leveled_up: level > self.level,
            streak_days: self.streak_on(today),
            last_active_date: today.max(self.last_active_date.unwrap_or(today)),
        }
    }
}

/// Fixed achievement catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Achievement {
    FirstQuiz,
    QuizRegular,
    PerfectScore,
    CardCollector,
    FlashcardMaster,
    CaseCritic,
    WeekStreak,
    MonthStreak,
    Level5,
    Level10,
}

impl Achievement {
    pub const ALL: [Achievement; 10] = [
        Achievement::FirstQuiz,
        Achievement::QuizRegular,
        Achievement::PerfectScore,
        Achievement::CardCollector,
        Achievement::FlashcardMaster,
        Achievement::CaseCritic,
        Achievement::WeekStreak,
        Achievement::MonthStreak,
        Achievement::Level5,
        Achievement::Level10,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Achievement::FirstQuiz => "first_quiz",
            Achievement::QuizRegular => "quiz_regular",
            Achievement::PerfectScore => "perfect_score",
            Achievement::CardCollector => "card_collector",
            Achievement::FlashcardMaster => "flashcard_master",
            Achievement::CaseCritic => "case_critic",
            Achievement::WeekStreak => "week_streak",
            Achievement::MonthStreak => "month_streak",
            Achievement::Level5 => "level_5",
            Achievement::Level10 => "level_10",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstQuiz => "First Quiz",
            Achievement::QuizRegular => "Quiz Regular",
            Achievement::PerfectScore => "Perfect Score",
            Achievement::CardCollector => "Card Collector",
            Achievement::FlashcardMaster => "Flashcard Master",
            Achievement::CaseCritic => "Case Critic",
            Achievement::WeekStreak => "One Week Streak",
            Achievement::MonthStreak => "One Month Streak",
            Achievement::Level5 => "Level 5",
            Achievement::Level10 => "Level 10",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }

    fn is_met(&self, ctx: &AchievementContext) -> bool {
        match self {
            Achievement::FirstQuiz => ctx.quiz_attempts >= 1,
            Achievement::QuizRegular => ctx.quiz_attempts >= 10,
            Achievement::PerfectScore => ctx.perfect_quizzes >= 1,
            Achievement::CardCollector => ctx.cards_reviewed >= 50,
            Achievement::FlashcardMaster => ctx.cards_reviewed >= 500,
            Achievement::CaseCritic => ctx.cases_rated >= 10,
            Achievement::WeekStreak => ctx.streak_days >= 7,
            Achievement::MonthStreak => ctx.streak_days >= 30,
            Achievement::Level5 => ctx.level >= 5,
            Achievement::Level10 => ctx.level >= 10,
        }
    }
}

/// An achievement a user has unlocked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockedAchievement {
    pub code: String,
    pub title: String,
    pub unlocked_at: DateTime<Utc>,
}

impl UnlockedAchievement {
    pub fn new(code: &str, unlocked_at: DateTime<Utc>) -> Self {
        let title = Achievement::from_code(code)
            .map(|a| a.title().to_string())
            .unwrap_or_else(|| code.to_string());
        Self {
            code: code.to_string(),
            title,
            unlocked_at,
        }
    }
}

/// Counters used to decide which achievements are unlocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct AchievementContext {
    pub quiz_attempts: i64,
    pub perfect_quizzes: i64,
    pub cards_reviewed: i64,
    pub cases_rated: i64,
    pub streak_days: i32,
    pub level: i32,
}

/// Every achievement whose condition currently holds.
pub fn evaluate(ctx: &AchievementContext) -> Vec<Achievement> {
    Achievement::ALL
        .into_iter()
        .filter(|a| a.is_met(ctx))
        .collect()
}
