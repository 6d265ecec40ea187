use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz category cannot be empty")]
    EmptyCategory,

    #[error("total time limit cannot exceed {max} minutes")]
    TimeLimitTooLong { max: u32 },
}

/// Longest total duration an admin can configure.
pub const MAX_TIME_LIMIT_MINUTES: u32 = 24 * 60;

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Quiz fields as entered by an admin, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuizDraft {
    pub title: String,
    pub category: String,
    pub description: String,
    pub points_per_correct_answer: u32,
    /// Whole-attempt limit in minutes; `0` disables the session timer.
    pub time_limit_minutes: u32,
    pub number_of_questions: Option<u32>,
}

impl QuizDraft {
    /// Validate the draft and stamp its creation time.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when the title or category is blank, or the time
    /// limit is unreasonably long.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedQuiz, QuizError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(QuizError::EmptyCategory);
        }
        if self.time_limit_minutes > MAX_TIME_LIMIT_MINUTES {
            return Err(QuizError::TimeLimitTooLong {
                max: MAX_TIME_LIMIT_MINUTES,
            });
        }

        Ok(ValidatedQuiz {
            title,
            category,
            description: self.description.trim().to_string(),
            points_per_correct_answer: self.points_per_correct_answer,
            total_time_limit_secs: minutes_to_secs(self.time_limit_minutes),
            number_of_questions: self.number_of_questions,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuiz {
    pub title: String,
    pub category: String,
    pub description: String,
    pub points_per_correct_answer: u32,
    pub total_time_limit_secs: Option<u32>,
    pub number_of_questions: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedQuiz {
    #[must_use]
    pub fn assign_id(self, id: QuizId) -> QuizDefinition {
        QuizDefinition {
            id,
            title: self.title,
            category: self.category,
            description: self.description,
            points_per_correct_answer: self.points_per_correct_answer,
            total_time_limit_secs: self.total_time_limit_secs,
            number_of_questions: self.number_of_questions,
            created_at: self.created_at,
            active: true,
        }
    }
}

//
// ─── DEFINITION ────────────────────────────────────────────────────────────────
//

/// An admin-authored quiz. Read-only to the session engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDefinition {
    pub id: QuizId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub points_per_correct_answer: u32,
    pub total_time_limit_secs: Option<u32>,
    pub number_of_questions: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl QuizDefinition {
    /// Whole-attempt limit in minutes, `0` when there is none.
    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.total_time_limit_secs.map_or(0, |secs| secs / 60)
    }
}

/// Converts an admin-entered minute count to the session timer's seconds.
#[must_use]
pub fn minutes_to_secs(minutes: u32) -> Option<u32> {
    (minutes > 0).then(|| minutes.saturating_mul(60))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
