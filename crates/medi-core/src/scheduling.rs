//! Fixed-interval spaced repetition.
//!
//! A confidence rating of 1..=5 maps to a review delay of 1, 3, 7, 14 or
//! 30 days. The table is static; it does not adapt to review history.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Review delay in days, indexed by `confidence - 1`.
pub const REVIEW_INTERVAL_DAYS: [i64; 5] = [1, 3, 7, 14, 30];

/// Delay until the next review for a confidence level.
///
/// Values outside 1..=5 fall back to one day.
pub fn next_review_interval(confidence: i32) -> TimeDelta {
    let days = match confidence {
        1..=5 => REVIEW_INTERVAL_DAYS[(confidence - 1) as usize],
        _ => REVIEW_INTERVAL_DAYS[0],
    };
    TimeDelta::days(days)
}

/// Timestamp of the next review for a card rated at `reviewed_at`.
pub fn next_review_at(confidence: i32, reviewed_at: DateTime<Utc>) -> DateTime<Utc> {
    reviewed_at + next_review_interval(confidence)
}

/// A card that has never been scheduled is always due.
pub fn is_due(next_review_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    next_review_at.is_none_or(|at| at <= now)
}

/// A validated self-rated recall strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Confidence(i16);

impl Confidence {
    /// Ratings at or above this level count as "mastered" in statistics.
    pub const MASTERED: i16 = 4;

    pub fn parse(value: i32) -> Result<Self, AppError> {
        if (1..=5).contains(&value) {
            Ok(Self(value as i16))
        } else {
            Err(AppError::Validation(format!(
                "confidence must be between 1 and 5, got {value}"
            )))
        }
    }

    pub fn value(&self) -> i16 {
        self.0
    }

    pub fn is_mastered(&self) -> bool {
        self.0 >= Self::MASTERED
    }

    pub fn next_review_at(&self, reviewed_at: DateTime<Utc>) -> DateTime<Utc> {
        next_review_at(self.0 as i32, reviewed_at)
    }
}
