//! Running rating aggregate kept on each case row.
//!
//! The aggregate stores `sum` and `count`; the average is derived. Updates
//! are applied inside the same database transaction that writes the
//! individual rating row.

use serde::Serialize;

use crate::error::AppError;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Validate a user-supplied star rating.
pub fn validate_rating(value: i32) -> Result<i16, AppError> {
    if (MIN_RATING as i32..=MAX_RATING as i32).contains(&value) {
        Ok(value as i16)
    } else {
        Err(AppError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {value}"
        )))
    }
}

/// `(count, sum)` of all ratings for one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RatingAggregate {
    pub count: i64,
    pub sum: i64,
}

impl RatingAggregate {
    pub fn new(count: i64, sum: i64) -> Self {
        Self { count, sum }
    }

    pub fn average(&self) -> f64 {
        if self.count <= 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Apply a new rating. If the user already rated the case, `previous`
    /// is their old value: the count stays the same and the sum moves by
    /// `new - previous`.
    pub fn apply(self, previous: Option<i16>, new: i16) -> Self {
        match previous {
            Some(old) => Self {
                count: self.count,
                sum: self.sum - old as i64 + new as i64,
            },
            None => Self {
                count: self.count + 1,
                sum: self.sum + new as i64,
            },
        }
    }

    /// Remove a previously counted rating.
    pub fn remove(self, rating: i16) -> Self {
        Self {
            count: (self.count - 1).max(0),
            sum: (self.sum - rating as i64).max(0),
        }
    }
}
