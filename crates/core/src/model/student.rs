use std::collections::BTreeMap;

use crate::model::ids::QuizId;
use crate::model::result::{QuizHistoryEntry, QuizResult};

/// Points needed to climb one level on the dashboard.
pub const POINTS_PER_LEVEL: u64 = 100;

/// Aggregate record kept for every student.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudentRecord {
    pub name: String,
    pub email: Option<String>,
    pub points: u64,
    pub quizzes_completed: u32,
    pub quiz_history: Vec<QuizHistoryEntry>,
    pub completed_quizzes: BTreeMap<QuizId, QuizResult>,
}

impl StudentRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Dashboard level, starting at 1.
    #[must_use]
    pub fn level(&self) -> u64 {
        self.points / POINTS_PER_LEVEL + 1
    }

    /// Fold a finished attempt into the running totals.
    pub fn record_result(&mut self, result: &QuizResult) {
        self.points = self.points.saturating_add(u64::from(result.points_earned));
        self.quizzes_completed = self.quizzes_completed.saturating_add(1);
        self.quiz_history.push(QuizHistoryEntry::from(result));
        if let Some(quiz_id) = result.origin.quiz_id() {
            self.completed_quizzes.insert(quiz_id.clone(), result.clone());
        }
    }
}
