//! Wire shapes of the documents kept in the store, and their domain mapping.
//!
//! Field names are camelCase to match what other clients of the same
//! database read and write.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{
    Correctness, DEFAULT_TIME_LIMIT_SECS, Question, QuestionError, QuizDefinition,
    QuizHistoryEntry, QuizId, QuizResult, ResultOrigin, StudentRecord, minutes_to_secs,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::repository::{RealtimeStore, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

// ─── Typed access ──────────────────────────────────────────────────────────────

/// Read and deserialize the document at `path`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` when the stored shape does not match.
pub async fn get_doc<T: DeserializeOwned>(
    store: &dyn RealtimeStore,
    path: &str,
) -> Result<Option<T>, StorageError> {
    store
        .get(path)
        .await?
        .map(|value| serde_json::from_value(value).map_err(ser))
        .transpose()
}

/// Serialize `doc` and replace the subtree at `path` with it.
///
/// # Errors
///
/// Returns `StorageError` if serialization or the write fails.
pub async fn set_doc<T: Serialize + Sync>(
    store: &dyn RealtimeStore,
    path: &str,
    doc: &T,
) -> Result<(), StorageError> {
    store.set(path, to_value(doc)?).await
}

/// # Errors
///
/// Returns `StorageError::Serialization` if `doc` cannot be represented as JSON.
pub fn to_value<T: Serialize>(doc: &T) -> Result<Value, StorageError> {
    serde_json::to_value(doc).map_err(ser)
}

/// Reads every child of `path` as `(key, doc)`, skipping ones that fail to
/// deserialize.
///
/// # Errors
///
/// Returns `StorageError` if the read itself fails.
pub async fn get_children<T: DeserializeOwned>(
    store: &dyn RealtimeStore,
    path: &str,
) -> Result<Vec<(String, T)>, StorageError> {
    let Some(value) = store.get(path).await? else {
        return Ok(Vec::new());
    };
    Ok(children(value))
}

/// Splits an already-read object or array into typed children.
pub fn children<T: DeserializeOwned>(value: Value) -> Vec<(String, T)> {
    let entries: Vec<(String, Value)> = match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(doc) => Some((key, doc)),
            Err(err) => {
                log::warn!("skipping malformed child {key}: {err}");
                None
            }
        })
        .collect()
}

// ─── Lenient numbers ───────────────────────────────────────────────────────────

/// Accepts `12`, `"12"` or garbage (read as 0), as typed into an admin form.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) if n.is_finite() && n >= 0.0 => {
            u32::try_from(n.trunc() as u64).unwrap_or(u32::MAX)
        }
        Raw::Text(s) => s
            .trim()
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0),
        _ => 0,
    })
}

// ─── Quizzes ───────────────────────────────────────────────────────────────────

/// Document at `quizzes/{quizId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDoc {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub points: u32,
    /// Whole-attempt limit in minutes; 0 or absent means none.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub time_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_questions: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl QuizDoc {
    #[must_use]
    pub fn from_definition(quiz: &QuizDefinition) -> Self {
        Self {
            title: quiz.title.clone(),
            category: quiz.category.clone(),
            description: quiz.description.clone(),
            points: quiz.points_per_correct_answer,
            time_limit: quiz.time_limit_minutes(),
            number_of_questions: quiz.number_of_questions,
            created_at: quiz.created_at,
            active: quiz.active,
        }
    }

    #[must_use]
    pub fn into_definition(self, id: QuizId) -> QuizDefinition {
        QuizDefinition {
            id,
            title: self.title,
            category: self.category,
            description: self.description,
            points_per_correct_answer: self.points,
            total_time_limit_secs: minutes_to_secs(self.time_limit),
            number_of_questions: self.number_of_questions,
            created_at: self.created_at,
            active: self.active,
        }
    }
}

/// One entry of the list at `quizQuestions/{quizId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDoc {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default = "default_question_limit")]
    pub time_limit: u32,
}

fn default_question_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECS
}

impl QuestionDoc {
    /// # Errors
    ///
    /// Returns `QuestionError` when the stored question is not playable.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let limit = if self.time_limit == 0 {
            DEFAULT_TIME_LIMIT_SECS
        } else {
            self.time_limit
        };
        Question::new(
            self.question,
            self.options,
            Correctness::Index(self.correct_answer),
            limit,
        )
    }
}

// ─── Results ───────────────────────────────────────────────────────────────────

/// A finished admin-quiz attempt, at `quizResults/{quizId}/{uid}` and under
/// the student's `completedQuizzes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultDoc {
    pub score: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub points_earned: u32,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub student_name: String,
    /// Seconds spent against the session timer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl QuizResultDoc {
    #[must_use]
    pub fn from_result(result: &QuizResult) -> Self {
        Self {
            score: result.score,
            total_questions: result.total_questions,
            points_earned: result.points_earned,
            completed_at: result.completed_at,
            student_name: result.student_name.clone(),
            time_taken: result.time_taken_secs,
            category: Some(result.origin.category().to_string()),
        }
    }

    #[must_use]
    pub fn into_result(self, quiz_id: QuizId) -> QuizResult {
        QuizResult {
            score: self.score,
            total_questions: self.total_questions,
            points_earned: self.points_earned,
            time_taken_secs: self.time_taken,
            completed_at: self.completed_at,
            student_name: self.student_name,
            origin: ResultOrigin::Quiz {
                quiz_id,
                category: self.category.unwrap_or_default(),
            },
        }
    }
}

// ─── Students ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDoc {
    pub date: DateTime<Utc>,
    pub score: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<&QuizHistoryEntry> for HistoryDoc {
    fn from(entry: &QuizHistoryEntry) -> Self {
        Self {
            date: entry.date,
            score: entry.score,
            total_questions: entry.total_questions,
            points: entry.points,
            category: entry.category.clone(),
        }
    }
}

impl From<HistoryDoc> for QuizHistoryEntry {
    fn from(doc: HistoryDoc) -> Self {
        Self {
            date: doc.date,
            score: doc.score,
            total_questions: doc.total_questions,
            points: doc.points,
            category: doc.category,
        }
    }
}

/// Document at `students/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub quizzes_completed: u32,
    #[serde(default)]
    pub quiz_history: Vec<HistoryDoc>,
    #[serde(default)]
    pub completed_quizzes: BTreeMap<String, QuizResultDoc>,
}

impl StudentDoc {
    #[must_use]
    pub fn from_record(record: &StudentRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            points: record.points,
            quizzes_completed: record.quizzes_completed,
            quiz_history: record.quiz_history.iter().map(HistoryDoc::from).collect(),
            completed_quizzes: record
                .completed_quizzes
                .iter()
                .map(|(id, result)| (id.to_string(), QuizResultDoc::from_result(result)))
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a completed-quiz key is not a
    /// valid quiz id.
    pub fn into_record(self) -> Result<StudentRecord, StorageError> {
        let mut completed_quizzes = BTreeMap::new();
        for (key, doc) in self.completed_quizzes {
            let id: QuizId = key.parse().map_err(ser)?;
            completed_quizzes.insert(id.clone(), doc.into_result(id));
        }
        Ok(StudentRecord {
            name: self.name,
            email: self.email,
            points: self.points,
            quizzes_completed: self.quizzes_completed,
            quiz_history: self.quiz_history.into_iter().map(Into::into).collect(),
            completed_quizzes,
        })
    }
}

// ─── Profiles and words ────────────────────────────────────────────────────────

/// Document at `students/{uid}/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub qualification: String,
    #[serde(
        default,
        deserialize_with = "lenient_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year_of_passing: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub education: String,
}

/// A blank form field is stored as `""`; anything else goes through
/// `lenient_u32`.
fn lenient_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        _ => lenient_u32(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// One child of `words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDoc {
    pub word: String,
    pub meaning: String,
}
