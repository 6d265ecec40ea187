//! Per-student progress aggregation for the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{POINTS_PER_LEVEL, QuizHistoryEntry, StudentRecord};

/// Label for history entries that carry no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProgress {
    pub category: String,
    pub attempts: u32,
    pub average_percentage: f64,
    pub best_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePoint {
    pub date: DateTime<Utc>,
    pub category: String,
    pub percentage: f64,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub total_quizzes: u32,
    pub average_percentage: f64,
    pub points: u64,
    pub level: u64,
    /// Sorted by category name.
    pub categories: Vec<CategoryProgress>,
    /// Oldest attempt first.
    pub timeline: Vec<TimelinePoint>,
}

impl ProgressReport {
    #[must_use]
    pub fn from_record(record: &StudentRecord) -> Self {
        Self::from_history(&record.quiz_history, record.points)
    }

    #[must_use]
    pub fn from_history(history: &[QuizHistoryEntry], points: u64) -> Self {
        let mut timeline: Vec<TimelinePoint> = history
            .iter()
            .map(|entry| TimelinePoint {
                date: entry.date,
                category: category_of(entry).to_string(),
                percentage: entry.percentage(),
                points: entry.points,
            })
            .collect();
        timeline.sort_by_key(|point| point.date);

        let mut by_category: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for entry in history {
            by_category
                .entry(category_of(entry))
                .or_default()
                .push(entry.percentage());
        }
        let categories = by_category
            .into_iter()
            .map(|(category, percentages)| CategoryProgress {
                category: category.to_string(),
                attempts: u32::try_from(percentages.len()).unwrap_or(u32::MAX),
                average_percentage: mean(&percentages),
                best_percentage: percentages.iter().copied().fold(0.0, f64::max),
            })
            .collect();

        let all: Vec<f64> = history.iter().map(QuizHistoryEntry::percentage).collect();
        Self {
            total_quizzes: u32::try_from(history.len()).unwrap_or(u32::MAX),
            average_percentage: mean(&all),
            points,
            level: points / POINTS_PER_LEVEL + 1,
            categories,
            timeline,
        }
    }

    /// Category with the lowest average, the natural next thing to practise.
    #[must_use]
    pub fn weakest_category(&self) -> Option<&CategoryProgress> {
        self.categories
            .iter()
            .min_by(|a, b| a.average_percentage.total_cmp(&b.average_percentage))
    }
}

fn category_of(entry: &QuizHistoryEntry) -> &str {
    entry
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(UNCATEGORIZED)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
