//! Simplified SM-2 review scheduling.
//!
//! Each graded answer scales both the ease factor and the interval by a fixed
//! per-grade multiplier. The ease factor never drops below [`MIN_EASE_FACTOR`].
//! A word whose interval is still 0 stays due after a passing grade, because
//! `ceil(0 * m) == 0`; only later grades stretch the interval.

pub mod shuffle;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use shuffle::{shuffle, shuffled_order};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Easy,
    Medium,
    Hard,
    Again,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Easy, Grade::Medium, Grade::Hard, Grade::Again];

    pub const fn multiplier(self) -> f64 {
        match self {
            Grade::Easy => 2.5,
            Grade::Medium => 2.0,
            Grade::Hard => 1.3,
            Grade::Again => 0.6,
        }
    }

    pub const fn is_correct(self) -> bool {
        !matches!(self, Grade::Again)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Grade::Easy => "easy",
            Grade::Medium => "medium",
            Grade::Hard => "hard",
            Grade::Again => "again",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown grade: {0}")]
pub struct ParseGradeError(String);

impl FromStr for Grade {
    type Err = ParseGradeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Grade::Easy),
            "medium" => Ok(Grade::Medium),
            "hard" => Ok(Grade::Hard),
            "again" => Ok(Grade::Again),
            other => Err(ParseGradeError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub word_id: String,
    pub times_studied: u32,
    pub last_studied: Option<DateTime<Utc>>,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub ease_factor: f64,
    /// Days until the next review; 0 means due now.
    pub interval: u32,
    pub next_review: Option<DateTime<Utc>>,
}

impl ReviewState {
    pub fn new(word_id: impl Into<String>) -> Self {
        Self {
            word_id: word_id.into(),
            times_studied: 0,
            last_studied: None,
            correct_count: 0,
            incorrect_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 0,
            next_review: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.map_or(true, |next| next <= now)
    }

    pub fn validate(&self) -> Result<(), ReviewStateError> {
        if self.ease_factor.is_nan() || self.ease_factor < MIN_EASE_FACTOR {
            return Err(ReviewStateError::EaseFactorBelowMinimum {
                word_id: self.word_id.clone(),
                ease_factor: self.ease_factor,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReviewStateError {
    #[error("ease factor {ease_factor} of word {word_id} is below the 1.3 minimum")]
    EaseFactorBelowMinimum { word_id: String, ease_factor: f64 },
}

/// Applies one graded answer and returns the updated state.
pub fn grade(state: &ReviewState, outcome: Grade, now: DateTime<Utc>) -> ReviewState {
    let multiplier = outcome.multiplier();
    let ease_factor = (state.ease_factor * multiplier).max(MIN_EASE_FACTOR);
    let interval = if outcome.is_correct() {
        (f64::from(state.interval) * multiplier).ceil() as u32
    } else {
        0
    };

    let (correct_count, incorrect_count) = if outcome.is_correct() {
        (state.correct_count.saturating_add(1), state.incorrect_count)
    } else {
        (state.correct_count, state.incorrect_count.saturating_add(1))
    };

    ReviewState {
        word_id: state.word_id.clone(),
        times_studied: state.times_studied.saturating_add(1),
        last_studied: Some(now),
        correct_count,
        incorrect_count,
        ease_factor,
        interval,
        next_review: Some(
            now.checked_add_signed(Duration::days(i64::from(interval)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
    }
}

/// [`grade`] that first rejects a state whose ease factor is already invalid.
pub fn try_grade(
    state: &ReviewState,
    outcome: Grade,
    now: DateTime<Utc>,
) -> Result<ReviewState, ReviewStateError> {
    state.validate()?;
    Ok(grade(state, outcome, now))
}

/// Words due at `now`: never-scheduled first, then by `next_review`, ties by
/// `word_id`.
pub fn due_queue<'a, I>(states: I, now: DateTime<Utc>) -> Vec<&'a ReviewState>
where
    I: IntoIterator<Item = &'a ReviewState>,
{
    let mut due: Vec<&ReviewState> = states.into_iter().filter(|s| s.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.next_review
            .cmp(&b.next_review)
            .then_with(|| a.word_id.cmp(&b.word_id))
    });
    due
}
