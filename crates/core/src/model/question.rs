use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewest options a multiple-choice question may offer.
pub const MIN_OPTIONS: usize = 2;
/// Most options a multiple-choice question may offer.
pub const MAX_OPTIONS: usize = 6;
/// Per-question limit used when a source does not specify one.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs between 2 and 6 options, got {count}")]
    OptionCount { count: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("time limit must be > 0")]
    ZeroTimeLimit,

    #[error("correct value {0:?} is not one of the options")]
    UnknownCorrectValue(String),

    #[error("correct index {index} out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },

    #[error("no option is marked correct")]
    NoCorrectOption,
}

//
// ─── CORRECTNESS ───────────────────────────────────────────────────────────────
//

/// How a question decides whether a selected option is right.
///
/// Sources describe correctness differently (a value, a set of values, or an
/// index); the session engine only ever calls [`Correctness::is_correct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    /// Exactly one option value is correct.
    Value(String),
    /// Any of these option values is correct.
    Values(BTreeSet<String>),
    /// The option at this position is correct.
    Index(usize),
}

impl Correctness {
    /// Returns true when the option at `selected` satisfies this rule.
    ///
    /// Out-of-range selections are never correct.
    #[must_use]
    pub fn is_correct(&self, options: &[String], selected: usize) -> bool {
        let Some(option) = options.get(selected) else {
            return false;
        };
        match self {
            Correctness::Value(value) => option == value,
            Correctness::Values(values) => values.contains(option),
            Correctness::Index(index) => *index == selected,
        }
    }

    /// The option values counted as correct, in option order.
    #[must_use]
    pub fn correct_values(&self, options: &[String]) -> Vec<String> {
        options
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_correct(options, *i))
            .map(|(_, option)| option.clone())
            .collect()
    }

    fn validate(&self, options: &[String]) -> Result<(), QuestionError> {
        match self {
            Correctness::Value(value) => {
                if !options.contains(value) {
                    return Err(QuestionError::UnknownCorrectValue(value.clone()));
                }
            }
            Correctness::Values(values) => {
                if values.is_empty() {
                    return Err(QuestionError::NoCorrectOption);
                }
                if let Some(missing) = values.iter().find(|v| !options.contains(v)) {
                    return Err(QuestionError::UnknownCorrectValue(missing.clone()));
                }
            }
            Correctness::Index(index) => {
                if *index >= options.len() {
                    return Err(QuestionError::CorrectIndexOutOfRange {
                        index: *index,
                        len: options.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated multiple-choice question, immutable for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: Vec<String>,
    correctness: Correctness,
    time_limit_secs: u32,
}

impl Question {
    /// Build a question, checking option count, text and correctness.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when any field violates the question rules.
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correctness: Correctness,
        time_limit_secs: u32,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(QuestionError::OptionCount {
                count: options.len(),
            });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if time_limit_secs == 0 {
            return Err(QuestionError::ZeroTimeLimit);
        }
        correctness.validate(&options)?;

        Ok(Self {
            text,
            options,
            correctness,
            time_limit_secs,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correctness(&self) -> &Correctness {
        &self.correctness
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        self.correctness.is_correct(&self.options, selected)
    }

    #[must_use]
    pub fn correct_answers(&self) -> Vec<String> {
        self.correctness.correct_values(&self.options)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn value_correctness_matches_option_text() {
        let q = Question::new(
            "Capital of France?",
            opts(&["Paris", "Lyon", "Nice"]),
            Correctness::Value("Paris".into()),
            30,
        )
        .unwrap();

        assert!(q.is_correct(0));
        assert!(!q.is_correct(1));
        assert!(!q.is_correct(9));
        assert_eq!(q.correct_answers(), vec!["Paris".to_string()]);
    }

    #[test]
    fn values_correctness_accepts_any_member() {
        let correct: BTreeSet<String> = ["ls", "dir"].iter().map(|s| (*s).to_string()).collect();
        let q = Question::new(
            "List files?",
            opts(&["ls", "cd", "dir", "rm"]),
            Correctness::Values(correct),
            30,
        )
        .unwrap();

        assert!(q.is_correct(0));
        assert!(q.is_correct(2));
        assert!(!q.is_correct(1));
        assert_eq!(q.correct_answers(), opts(&["ls", "dir"]));
    }

    #[test]
    fn index_correctness_uses_position() {
        let q = Question::new("2+2?", opts(&["3", "4"]), Correctness::Index(1), 10).unwrap();
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn rejects_bad_option_counts() {
        let err = Question::new("q", opts(&["only"]), Correctness::Index(0), 10).unwrap_err();
        assert_eq!(err, QuestionError::OptionCount { count: 1 });

        let seven = opts(&["a", "b", "c", "d", "e", "f", "g"]);
        let err = Question::new("q", seven, Correctness::Index(0), 10).unwrap_err();
        assert_eq!(err, QuestionError::OptionCount { count: 7 });
    }

    #[test]
    fn rejects_zero_time_limit_and_blank_fields() {
        let err = Question::new("q", opts(&["a", "b"]), Correctness::Index(0), 0).unwrap_err();
        assert_eq!(err, QuestionError::ZeroTimeLimit);

        let err = Question::new("  ", opts(&["a", "b"]), Correctness::Index(0), 5).unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);

        let err = Question::new("q", opts(&["a", " "]), Correctness::Index(0), 5).unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption { index: 1 });
    }

    #[test]
    fn rejects_correctness_outside_options() {
        let err = Question::new("q", opts(&["a", "b"]), Correctness::Index(2), 5).unwrap_err();
        assert!(matches!(
            err,
            QuestionError::CorrectIndexOutOfRange { index: 2, len: 2 }
        ));

        let err = Question::new("q", opts(&["a", "b"]), Correctness::Value("c".into()), 5)
            .unwrap_err();
        assert_eq!(err, QuestionError::UnknownCorrectValue("c".into()));

        let err = Question::new(
            "q",
            opts(&["a", "b"]),
            Correctness::Values(BTreeSet::new()),
            5,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::NoCorrectOption);
    }
}
