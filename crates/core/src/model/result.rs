use chrono::{DateTime, Utc};

use crate::model::ids::QuizId;

/// Where the questions of a finished attempt came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultOrigin {
    /// A public or category question feed.
    Feed { category: String },
    /// An admin-authored quiz.
    Quiz { quiz_id: QuizId, category: String },
}

impl ResultOrigin {
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            ResultOrigin::Feed { category } | ResultOrigin::Quiz { category, .. } => category,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> Option<&QuizId> {
        match self {
            ResultOrigin::Feed { .. } => None,
            ResultOrigin::Quiz { quiz_id, .. } => Some(quiz_id),
        }
    }
}

/// Final, persisted outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub score: u32,
    pub total_questions: u32,
    pub points_earned: u32,
    /// Configured total minus what was left on the session timer, when one ran.
    pub time_taken_secs: Option<u32>,
    pub completed_at: DateTime<Utc>,
    pub student_name: String,
    pub origin: ResultOrigin,
}

impl QuizResult {
    /// Score as a percentage of the questions in the attempt.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.score, self.total_questions)
    }
}

/// One line of a student's quiz history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizHistoryEntry {
    pub date: DateTime<Utc>,
    pub score: u32,
    pub total_questions: u32,
    pub points: u32,
    pub category: Option<String>,
}

impl QuizHistoryEntry {
    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.score, self.total_questions)
    }
}

impl From<&QuizResult> for QuizHistoryEntry {
    fn from(result: &QuizResult) -> Self {
        Self {
            date: result.completed_at,
            score: result.score,
            total_questions: result.total_questions,
            points: result.points_earned,
            category: Some(result.origin.category().to_string()),
        }
    }
}

pub(crate) fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total) * 100.0
}
